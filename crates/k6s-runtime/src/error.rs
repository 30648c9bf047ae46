//! Runtime composition errors.

use thiserror::Error;

/// Errors raised while starting up, running, or tearing down a
/// [`Runtime`](crate::Runtime).
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The Store failed during migration, open, or a later query.
    #[error("storage: {0}")]
    Storage(#[from] k6s_storage::StoreError),
    /// A state-manager call failed.
    #[error("state: {0}")]
    State(#[from] k6s_state::StateError),
    /// The audit logger failed to start, log, or flush.
    #[error("audit: {0}")]
    Audit(#[from] k6s_audit::AuditError),
    /// The filesystem watcher failed to start.
    #[error("watcher: {0}")]
    Watcher(#[from] k6s_watcher::WatcherError),
    /// The lock manager failed while releasing locks on shutdown.
    #[error("lock: {0}")]
    Lock(#[from] k6s_lock::LockError),
    /// The tool-call transport loop failed.
    #[error("tool server: {0}")]
    ToolServer(#[from] k6s_tool_server::ToolServerError),
    /// The liveness marker already exists — a session is already active.
    #[error("a session is already active in this project (liveness marker present at {0})")]
    SessionAlreadyActive(std::path::PathBuf),
    /// Reading, writing, or removing the liveness marker failed.
    #[error("liveness marker I/O: {0}")]
    Io(#[from] std::io::Error),
    /// The liveness marker exists but is not valid JSON, or no session id
    /// could be resolved from it or `K6S_SESSION_ID`.
    #[error("could not resolve an active session: {0}")]
    NoActiveSession(String),
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, RuntimeError>;
