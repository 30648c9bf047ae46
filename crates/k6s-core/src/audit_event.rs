//! The `AuditEvent` row shape, shared by the event bus, the audit
//! logger, and the tool server.

use serde::{Deserialize, Serialize};

use crate::event::EventType;
use crate::ids::{AgentId, AuditEventId, SessionId};

/// One row in the per-session audit log.
///
/// `sequence` is assigned by `k6s_audit::AuditLogger`, not by callers;
/// it is `0` on events that haven't been through the logger yet (e.g.
/// while under construction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Row id.
    pub id: AuditEventId,
    /// Owning session.
    pub session_id: SessionId,
    /// Agent that caused this event, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    /// Monotonic, gap-free per-session ordinal.
    pub sequence: u64,
    /// Wall-clock time the event was accepted, RFC 3339.
    pub timestamp: String,
    /// Which closed-set event type this is.
    pub event_type: EventType,
    /// Free-form action label (e.g. `"file_write"`, `"lock_acquire"`).
    pub action: String,
    /// Structured detail payload.
    pub details: serde_json::Value,
    /// Project-relative paths touched by this event.
    pub files_affected: Vec<String>,
    /// Gate that this event is associated with, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_id: Option<String>,
    /// Reserved for tamper-evidence. Defined but never populated by
    /// this engine today.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hmac: Option<String>,
}
