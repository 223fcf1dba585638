//! Errors this crate can produce.

use thiserror::Error;

/// Result alias for `nexus-scheduler`.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong parsing a cron spec or running a task.
#[derive(Debug, Error)]
pub enum Error {
    /// A `ScheduledTask.cronspec` did not parse.
    #[error("invalid cron spec '{0}': {1}")]
    InvalidCronSpec(String, String),

    /// The persisted task-queue store failed.
    #[error("ledger error: {0}")]
    Ledger(#[from] nexus_ledger::Error),

    /// A task's `fetch`/`submit` dispatch failed. Logged, never disables
    /// the task.
    #[error("task dispatch failed: {0}")]
    Dispatch(String),
}
