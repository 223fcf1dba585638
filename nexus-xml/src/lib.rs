//! # nexus-xml
//!
//! The canonicalization and signing layer shared by the EBICS transport and
//! ISO 20022 document crates:
//!
//! - [`canonical`] — the exclusive-C14N subset applied to an envelope's
//!   `authenticate="true"` elements.
//! - [`signature`] — embedding and verifying the `AuthSignature` block built
//!   on top of that canonical form.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod canonical;
pub mod error;
pub mod signature;

pub use error::{Error, Result};
