//! Storage error types.

use thiserror::Error;

/// Errors raised by [`crate::Store`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening the database file or applying pragmas failed.
    #[error("failed to open store: {0}")]
    Open(String),

    /// A migration failed to apply.
    #[error("migration {version} failed: {reason}")]
    Migration {
        /// The migration version that failed.
        version: i64,
        /// Why it failed.
        reason: String,
    },

    /// A unique or foreign-key constraint was violated.
    ///
    /// Per the error-handling taxonomy, this is a programmer error:
    /// callers are expected to avoid duplicate inserts, not retry.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Any other underlying `rusqlite` failure.
    #[error("storage error: {0}")]
    Query(#[from] rusqlite::Error),

    /// The background blocking task the query ran on panicked or was
    /// cancelled.
    #[error("storage task failed: {0}")]
    Task(String),
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, StoreError>;
