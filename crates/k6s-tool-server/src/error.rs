//! Tool server error types.
//!
//! A bad tool call never produces one of these — it's caught and folded
//! into a `{"error": ...}` text result. This enum only covers failures
//! in the transport loop itself (stdin closed, write failure), which
//! `run` propagates to its caller.

use thiserror::Error;

/// Errors raised by the stdio transport loop.
#[derive(Debug, Error)]
pub enum ToolServerError {
    /// The underlying stream failed.
    #[error("tool server I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, ToolServerError>;
