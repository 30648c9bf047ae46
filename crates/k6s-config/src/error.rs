//! Config loading/validation errors.

use thiserror::Error;

/// Errors surfaced while parsing or validating a [`crate::K6sConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document didn't deserialize — usually an unknown key, since
    /// the root type rejects anything outside the documented sections.
    #[error("invalid configuration document: {0}")]
    Invalid(String),
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, ConfigError>;
