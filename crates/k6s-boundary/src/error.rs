//! Boundary enforcement error types.

use thiserror::Error;

/// Errors raised by [`crate::BoundaryEnforcer`].
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] k6s_storage::StoreError),

    /// A configured glob pattern didn't compile.
    #[error("invalid glob pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The pattern that failed to compile.
        pattern: String,
        /// Why `globset` rejected it.
        reason: String,
    },
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, BoundaryError>;
