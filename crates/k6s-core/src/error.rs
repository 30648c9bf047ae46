//! Errors shared by the domain types in this crate.

use thiserror::Error;

/// Errors raised while parsing or validating core domain types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A string didn't match any variant of a closed enum.
    #[error("unknown {kind} value: {value}")]
    UnknownVariant {
        /// Which enum was being parsed.
        kind: &'static str,
        /// The value that didn't match.
        value: String,
    },
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, CoreError>;
