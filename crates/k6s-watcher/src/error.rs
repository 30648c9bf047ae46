//! Watcher error types.

use thiserror::Error;

/// Errors raised by [`crate::FileWatcher`].
///
/// Per-event failures (a dropped queue slot, a denied boundary check)
/// are not modeled here — they're logged and the watcher keeps running.
/// This enum only carries failures that prevent the watcher from
/// starting at all.
#[derive(Debug, Error)]
pub enum WatcherError {
    /// The underlying `notify` backend couldn't be initialized or
    /// couldn't watch the requested root.
    #[error("filesystem watcher: {0}")]
    Backend(String),

    /// An ignore pattern couldn't be compiled.
    #[error("invalid ignore pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The offending glob.
        pattern: String,
        /// Why `globset` rejected it.
        reason: String,
    },
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, WatcherError>;
