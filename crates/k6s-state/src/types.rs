//! Row types owned by this crate.

use k6s_core::{AgentId, AgentRole, AgentState, SessionId, SessionState};
use serde::{Deserialize, Serialize};

/// One governance episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Row id.
    pub id: SessionId,
    /// Free-form description of what this session is trying to do.
    pub objective: String,
    /// Lifecycle state.
    pub state: SessionState,
    /// When the session was created, RFC 3339.
    pub started_at: String,
    /// When the session reached a terminal state, RFC 3339.
    pub ended_at: Option<String>,
    /// The session this one resumed from, if any.
    pub parent_session_id: Option<SessionId>,
    /// The configuration in effect when the session started.
    pub config_snapshot: Option<serde_json::Value>,
    /// Carry-over summary from a resumed predecessor.
    pub context_summary: Option<String>,
    /// Accumulated cost, in USD.
    pub total_cost_usd: f64,
    /// Accumulated input tokens.
    pub total_input_tokens: i64,
    /// Accumulated output tokens.
    pub total_output_tokens: i64,
    /// Opaque bag of additional attributes.
    pub metadata: serde_json::Value,
}

/// A named actor operating within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Row id.
    pub id: AgentId,
    /// Owning session.
    pub session_id: SessionId,
    /// Unique (within the session) display name, matched against
    /// boundary patterns.
    pub name: String,
    /// Whether this agent drives the session or was spawned into it.
    pub role: AgentRole,
    /// Free-form specialization label (e.g. `"frontend"`).
    pub specialization: Option<String>,
    /// Lifecycle state.
    pub state: AgentState,
    /// When the agent was registered, RFC 3339.
    pub spawned_at: String,
    /// The boundary configuration resolved for this agent, if any.
    pub boundary_config: Option<serde_json::Value>,
    /// Opaque bag of additional attributes.
    pub metadata: serde_json::Value,
}

/// One saved key/value entry, scoped to a session and optionally an
/// agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    /// Owning session.
    pub session_id: SessionId,
    /// Unique (within the session) key.
    pub key: String,
    /// Agent that saved this entry, if known.
    pub agent_id: Option<AgentId>,
    /// Arbitrarily shaped value; no schema is imposed.
    pub value: serde_json::Value,
    /// When this entry was last written, RFC 3339. Never decreases for
    /// a fixed `(session_id, key)`.
    pub updated_at: String,
}
