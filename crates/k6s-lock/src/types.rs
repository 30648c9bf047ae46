//! Row and result shapes owned by this crate.

use k6s_core::{AgentId, SessionId};
use serde::{Deserialize, Serialize};

/// One row in `file_locks`.
///
/// Held iff it exists and `now <= expires_at` (`None` means immortal,
/// though the default acquisition always sets a 300 s expiry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLock {
    /// The locked path, project-relative.
    pub path: String,
    /// Owning session.
    pub session_id: SessionId,
    /// The agent currently holding the lock.
    pub agent_id: AgentId,
    /// When the lock was (most recently) acquired/extended, RFC 3339.
    pub acquired_at: String,
    /// When the lock expires, RFC 3339. `None` is immortal.
    pub expires_at: Option<String>,
}

/// The outcome of an [`crate::LockManager::acquire`] or
/// [`crate::LockManager::release`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockResult {
    /// Whether the operation succeeded.
    pub success: bool,
    /// The path the operation concerned.
    pub lock_token: String,
    /// The lock's expiry after this operation, if it still exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    /// Why the operation failed, or an informational note on success
    /// (e.g. releasing an already-released lock).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl LockResult {
    pub(crate) fn ok(path: impl Into<String>, expires_at: Option<String>) -> Self {
        Self {
            success: true,
            lock_token: path.into(),
            expires_at,
            reason: None,
        }
    }

    pub(crate) fn ok_with_reason(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            success: true,
            lock_token: path.into(),
            expires_at: None,
            reason: Some(reason.into()),
        }
    }

    pub(crate) fn denied(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            lock_token: path.into(),
            expires_at: None,
            reason: Some(reason.into()),
        }
    }
}
