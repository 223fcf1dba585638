//! Error type for XML canonicalization and signature handling.

use thiserror::Error as ThisError;

/// Errors raised while canonicalizing or signing/verifying EBICS envelopes.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The document is not well-formed XML.
    #[error("malformed XML: {0}")]
    Malformed(String),

    /// An element expected to carry `authenticate="true"` was not found.
    #[error("no authenticated elements found in document")]
    NoAuthenticatedElements,

    /// The embedded `ds:Signature` block is missing or structurally invalid.
    #[error("signature block missing or malformed: {0}")]
    BadSignatureBlock(String),

    /// Signature verification failed (digest or signature mismatch).
    #[error(transparent)]
    Crypto(#[from] nexus_crypto::Error),
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Malformed(e.to_string())
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
