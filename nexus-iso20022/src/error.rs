//! Error type for pain.001 generation and camt.05x parsing.

use thiserror::Error as ThisError;

/// Errors raised by this crate's builders and parsers.
#[derive(Debug, ThisError)]
pub enum Error {
    /// An `InstdAmt` would need more than 2 fractional digits on the wire.
    #[error("amount {0} has more than 2 fractional digits")]
    ExcessPrecision(String),

    /// Writing the pain.001 XML failed.
    #[error("pain.001 serialization failed: {0}")]
    Serialization(String),

    /// The camt document could not be parsed.
    #[error("camt parse failed: {0}")]
    Parse(String),

    /// An `Ntry` element had no `AcctSvcrRef` and was dropped.
    #[error("entry has no AcctSvcrRef, dropped")]
    MissingAcctSvcrRef,
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<quick_xml::DeError> for Error {
    fn from(e: quick_xml::DeError) -> Self {
        Error::Parse(e.to_string())
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
