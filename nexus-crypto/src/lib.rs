//! # nexus-crypto
//!
//! Cryptographic primitives for the EBICS client protocol:
//!
//! - A006 digital signatures (RSA-PKCS#1-v1.5 over a normalized SHA-256
//!   digest of order data) — [`signature`].
//! - E002 hybrid encryption (AES-128-CBC with a random per-transaction key,
//!   itself RSA-wrapped to the bank's encryption key) — [`cipher`].
//! - Raw DEFLATE compression of order data — [`compress`].
//! - RSA key load/store in PKCS#8/SubjectPublicKeyInfo DER — [`keys`].
//!
//! This crate never panics on malformed input; every fallible operation
//! returns [`Error`].

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod cipher;
pub mod compress;
pub mod digest;
pub mod encoding;
pub mod error;
pub mod keys;
pub mod signature;

pub use error::{Error, Result};

pub use rsa::{RsaPrivateKey, RsaPublicKey};
