//! Errors this crate can produce, composed with `#[from]` the same way the
//! rest of the workspace does it.

use thiserror::Error;

/// Result alias for `nexus-ledger`.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong persisting or mutating the data model.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying database call failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A named resource (connection, account, task, ...) does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What kind of resource, e.g. `"bank account"`.
        kind: &'static str,
        /// The id or label that was looked up.
        id: String,
    },

    /// A unique constraint (name, label, `(account, uid)`) was violated by
    /// a non-idempotent caller.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// An `EbicsSubscriber`'s HPB exchange has not yet completed, so there
    /// is no bank key material to select a decryption key or verify a
    /// signature against.
    #[error("connection {0} has no bank keys yet; run HPB first")]
    BankKeysMissing(uuid::Uuid),

    /// A value supplied by a caller failed a persistence-layer invariant,
    /// e.g. an amount with more than 2 decimal places.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
