//! Audit logger error types.

use thiserror::Error;

/// Errors raised by [`crate::AuditLogger`].
#[derive(Debug, Error)]
pub enum AuditError {
    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] k6s_storage::StoreError),

    /// A row in `audit_events` didn't decode into the expected shape.
    #[error("corrupt audit row: {0}")]
    Corrupt(String),

    /// The background flush task panicked or was already gone when a
    /// caller tried to join it.
    #[error("flush task failed: {0}")]
    FlushTask(String),
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, AuditError>;
