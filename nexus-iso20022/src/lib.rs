//! # nexus-iso20022
//!
//! pain.001 generation and camt.052/053/054 ingestion:
//!
//! - [`pain001`] — build a pain.001 document from a [`pain001::PaymentInitiationData`].
//! - [`camt`] — parse camt.05x documents into canonical [`entry::BankTransactionEntry`] rows.
//! - [`entry`] — the canonical entry model shared by both directions.
//! - [`dialect`] — EBICS H004/H005 version selection.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod camt;
pub mod dialect;
pub mod entry;
pub mod error;
pub mod pain001;

pub use error::{Error, Result};
