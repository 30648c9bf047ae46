//! The `daemon.state` liveness marker.
//!
//! Its existence, not a PID, is what marks a session active: a crashed
//! process leaves the marker behind and the next start refuses to run
//! rather than silently clobbering whatever that session left in the
//! database.

use std::path::{Path, PathBuf};

use k6s_core::SessionId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RuntimeError};

/// Contents of `.khoregos/daemon.state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessMarker {
    /// The active session.
    pub session_id: SessionId,
    /// When the session started, RFC 3339.
    pub started_at: String,
    /// Absolute path to the project this session governs.
    pub project_root: PathBuf,
}

/// Path to the liveness marker under a project's engine directory.
#[must_use]
pub fn marker_path(engine_dir: &Path) -> PathBuf {
    engine_dir.join("daemon.state")
}

/// Write the liveness marker, refusing if one already exists.
///
/// Owner-only permissions are applied on unix, matching the rest of the
/// engine directory's files.
pub fn write_marker(engine_dir: &Path, marker: &LivenessMarker) -> Result<()> {
    let path = marker_path(engine_dir);
    if path.exists() {
        return Err(RuntimeError::SessionAlreadyActive(path));
    }

    let json = serde_json::to_vec_pretty(marker).map_err(|e| {
        RuntimeError::NoActiveSession(format!("could not serialize liveness marker: {e}"))
    })?;
    std::fs::write(&path, json)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

/// Read and parse the liveness marker, if present.
pub fn read_marker(engine_dir: &Path) -> Result<Option<LivenessMarker>> {
    let path = marker_path(engine_dir);
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read(&path)?;
    let marker = serde_json::from_slice(&raw).map_err(|e| {
        RuntimeError::NoActiveSession(format!("liveness marker at {} is corrupt: {e}", path.display()))
    })?;
    Ok(Some(marker))
}

/// Remove the liveness marker. A missing marker is not an error — the
/// shutdown path may be reached twice (e.g. signal then explicit stop).
pub fn remove_marker(engine_dir: &Path) -> Result<()> {
    let path = marker_path(engine_dir);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "liveness marker already absent");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Resolve the session id to bind to, per `K6S_SESSION_ID` overriding
/// the marker's own `session_id` when the `ToolServer` is launched
/// out-of-band from the process that wrote the marker.
pub fn resolve_session_id(engine_dir: &Path) -> Result<SessionId> {
    if let Ok(raw) = std::env::var("K6S_SESSION_ID") {
        return Ok(SessionId::from(raw));
    }
    read_marker(engine_dir)?
        .map(|marker| marker.session_id)
        .ok_or_else(|| {
            RuntimeError::NoActiveSession(
                "no liveness marker and no K6S_SESSION_ID set".to_string(),
            )
        })
}
