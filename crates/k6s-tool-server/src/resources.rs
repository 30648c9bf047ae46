//! Read-only `k6s://` resources exposed alongside the tool set.

use k6s_audit::AuditLogger;
use k6s_boundary::BoundaryEnforcer;
use k6s_core::SessionId;
use k6s_state::StateManager;

/// Number of audit events returned by `k6s://audit/recent`.
const RECENT_AUDIT_LIMIT: u32 = 50;

/// Resolve a `k6s://` resource URI to its JSON payload.
///
/// Returns `None` for an unrecognized URI so the caller can fold it
/// into the same `{"error": ...}` shape used for unknown tools.
pub async fn read_resource(
    uri: &str,
    state: &StateManager,
    audit: &AuditLogger,
    boundary: &BoundaryEnforcer,
    session_id: &SessionId,
) -> Option<Result<serde_json::Value, String>> {
    match uri {
        "k6s://session/current" => Some(session_current(state, session_id).await),
        "k6s://audit/recent" => Some(audit_recent(audit).await),
        "k6s://boundaries/all" => Some(Ok(serde_json::json!(boundary.all_configs()))),
        _ => None,
    }
}

async fn session_current(
    state: &StateManager,
    session_id: &SessionId,
) -> Result<serde_json::Value, String> {
    let session = state
        .get_session(session_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("session not found: {session_id}"))?;
    let agents = state.list_agents(session_id).await.map_err(|e| e.to_string())?;

    Ok(serde_json::json!({
        "session": session,
        "agents": agents,
    }))
}

async fn audit_recent(audit: &AuditLogger) -> Result<serde_json::Value, String> {
    let events = audit
        .get_events(RECENT_AUDIT_LIMIT, 0, None, None, None)
        .await
        .map_err(|e| e.to_string())?;
    Ok(serde_json::json!(events))
}
