//! # nexus-ledger
//!
//! The persisted data model (spec.md §3) over a relational store, the
//! `PaymentInitiation` idempotency/state machine, and the generic
//! facade-bus extension point (§4.6).

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod error;
pub mod facade;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use facade::{FacadeBus, NoopFacadeBus};
pub use store::Database;
