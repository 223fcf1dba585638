//! The EBICS engine's error taxonomy.
//!
//! Four kinds of failure are distinguished because they call for different
//! handling by the caller (the scheduler or an API route): transport
//! failures are retried in place, bank-reported technical errors mean the
//! bank has already closed the transaction, framing errors are fatal and
//! need operator attention, and post-processing errors are fatal but worth
//! preserving ciphertext for.

use thiserror::Error as ThisError;

/// One of the technical return codes EBICS banks report in `<TechnicalReturnCode>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TechnicalCode {
    /// `000000` — success.
    Ok,
    /// `011000` — download post-processing done.
    DownloadPostprocessDone,
    /// `011001` — download post-processing skipped.
    DownloadPostprocessSkipped,
    /// `061002` — segment number too low for the transaction's state.
    TxSegmentNumberUnderrun,
    /// `091002` — signature verification or auth failure.
    AuthenticationFailed,
    /// `091004` — unknown or disabled user/subscriber state.
    InvalidUserOrUserState,
    /// `091112` — generic bank-side processing error.
    ProcessingError,
    /// `091302` — the debtor account is not authorized for this subscriber.
    AccountAuthorisationFailed,
    /// `091303` — amount check failed (e.g. overdraft).
    AmountCheckFailed,
    /// `090003` — order identifier not authorized for this user.
    AuthorisationOrderIdentifierFailed,
    /// `090005` — no data available for the requested download range.
    NoDownloadDataAvailable,
    /// Any code this engine does not explicitly model.
    Other(String),
}

impl TechnicalCode {
    /// Parse the numeric code EBICS carries on the wire.
    pub fn from_wire(code: &str) -> Self {
        match code {
            "000000" => TechnicalCode::Ok,
            "011000" => TechnicalCode::DownloadPostprocessDone,
            "011001" => TechnicalCode::DownloadPostprocessSkipped,
            "061002" => TechnicalCode::TxSegmentNumberUnderrun,
            "091002" => TechnicalCode::AuthenticationFailed,
            "091004" => TechnicalCode::InvalidUserOrUserState,
            "091112" => TechnicalCode::ProcessingError,
            "091302" => TechnicalCode::AccountAuthorisationFailed,
            "091303" => TechnicalCode::AmountCheckFailed,
            "090003" => TechnicalCode::AuthorisationOrderIdentifierFailed,
            "090005" => TechnicalCode::NoDownloadDataAvailable,
            other => TechnicalCode::Other(other.to_string()),
        }
    }

    /// `true` for `000000` and the two download post-processing successes.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            TechnicalCode::Ok
                | TechnicalCode::DownloadPostprocessDone
                | TechnicalCode::DownloadPostprocessSkipped
        )
    }

    /// The constant name EBICS banks use in documentation and logs.
    pub fn as_str(&self) -> &str {
        match self {
            TechnicalCode::Ok => "EBICS_OK",
            TechnicalCode::DownloadPostprocessDone => "EBICS_DOWNLOAD_POSTPROCESS_DONE",
            TechnicalCode::DownloadPostprocessSkipped => "EBICS_DOWNLOAD_POSTPROCESS_SKIPPED",
            TechnicalCode::TxSegmentNumberUnderrun => "EBICS_TX_SEGMENT_NUMBER_UNDERRUN",
            TechnicalCode::AuthenticationFailed => "EBICS_AUTHENTICATION_FAILED",
            TechnicalCode::InvalidUserOrUserState => "EBICS_INVALID_USER_OR_USER_STATE",
            TechnicalCode::ProcessingError => "EBICS_PROCESSING_ERROR",
            TechnicalCode::AccountAuthorisationFailed => "EBICS_ACCOUNT_AUTHORISATION_FAILED",
            TechnicalCode::AmountCheckFailed => "EBICS_AMOUNT_CHECK_FAILED",
            TechnicalCode::AuthorisationOrderIdentifierFailed => {
                "EBICS_AUTHORISATION_ORDER_IDENTIFIER_FAILED"
            }
            TechnicalCode::NoDownloadDataAvailable => "EBICS_NO_DOWNLOAD_DATA_AVAILABLE",
            TechnicalCode::Other(_) => "EBICS_OTHER",
        }
    }
}

/// Errors raised by the EBICS engine.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The bank was unreachable or the TLS/HTTP layer failed. Retryable.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The bank responded but reported a non-success technical code. The
    /// bank has already closed this transaction; do not RECEIPT.
    #[error("bank reported {code}: {reason}")]
    BankTechnical {
        /// The wire code, e.g. `091302`.
        code: String,
        /// The constant name, e.g. `EBICS_ACCOUNT_AUTHORISATION_FAILED`.
        reason: String,
    },

    /// The bank reported there is no data available for the requested
    /// download range. Not an error condition for callers: the transaction
    /// simply terminates with zero documents.
    #[error("no download data available")]
    NoDownloadDataAvailable,

    /// Malformed XML, a missing required field, or a signature-verification
    /// failure. Fatal; no retry without operator intervention.
    #[error("protocol framing error: {0}")]
    Framing(String),

    /// Decrypt/inflate failed after the bank had already said OK.
    #[error("post-processing failure: {0}")]
    PostProcessing(String),

    /// A cryptographic operation failed.
    #[error(transparent)]
    Crypto(#[from] nexus_crypto::Error),

    /// XML canonicalization/signing failed.
    #[error(transparent)]
    Xml(#[from] nexus_xml::Error),

    /// pain.001/camt processing failed.
    #[error(transparent)]
    Iso20022(#[from] nexus_iso20022::Error),

    /// The 6-character alphanumeric order ID space for this subscriber has
    /// been exhausted (~456 million orders). The subscriber's rolling state
    /// must be reset out of band; this is not silently wrapped.
    #[error("order ID space exhausted for this subscriber")]
    OrderIdOverflow,
}

impl Error {
    /// Build a [`Error::BankTechnical`] from a wire technical code.
    pub fn bank_technical(code: &str) -> Self {
        let technical = TechnicalCode::from_wire(code);
        Error::BankTechnical {
            code: code.to_string(),
            reason: technical.as_str().to_string(),
        }
    }

    /// `true` if retrying the whole transaction from scratch might succeed
    /// (transport failures only).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
