//! Lock manager error types.

use thiserror::Error;

/// Errors raised by [`crate::LockManager`].
///
/// Lock contention itself is *not* an error — it's a structured
/// `{success: false, reason}` value on [`crate::LockResult`] — so this
/// enum only carries failures that genuinely can't be expressed as a
/// normal outcome.
#[derive(Debug, Error)]
pub enum LockError {
    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] k6s_storage::StoreError),
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, LockError>;
