//! Error types for cryptographic operations

use thiserror::Error;

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, Error>;

/// Crypto errors
#[derive(Error, Debug)]
pub enum Error {
    /// The signature did not verify against the expected digest
    #[error("bad signature")]
    BadSignature,

    /// RSA or AES operation failed (wrong padding, wrong key size, etc.)
    #[error("crypto failure: {0}")]
    CryptoFailure(String),

    /// Key material was malformed (not valid PKCS#8/PKCS#1 DER)
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// DEFLATE/INFLATE failed
    #[error("compression error: {0}")]
    Compression(String),

    /// Base64 decoding failed
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// IO error reading/writing key material at rest
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rsa::Error> for Error {
    fn from(e: rsa::Error) -> Self {
        Error::CryptoFailure(e.to_string())
    }
}
