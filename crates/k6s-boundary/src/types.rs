//! Row and result shapes owned by this crate.

use k6s_core::{AgentId, EnforcementAction, SessionId, ViolationType};
use serde::{Deserialize, Serialize};

/// One row in `boundary_violations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryViolation {
    /// Row id.
    pub id: String,
    /// Owning session.
    pub session_id: SessionId,
    /// Agent responsible, if known (`None` for watcher-detected changes).
    pub agent_id: Option<AgentId>,
    /// When the violation was recorded, RFC 3339.
    pub timestamp: String,
    /// Project-relative path that triggered the violation.
    pub file_path: String,
    /// Which rule was broken.
    pub violation_type: ViolationType,
    /// What the enforcer actually did about it.
    pub enforcement_action: EnforcementAction,
    /// Structured detail payload (e.g. the pattern that matched).
    pub details: serde_json::Value,
}

/// The outcome of a [`crate::BoundaryEnforcer::check_path_allowed`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// Whether the path access is allowed.
    pub allowed: bool,
    /// Why it was denied, when `allowed` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CheckResult {
    pub(crate) fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub(crate) fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// The shape the `get_boundaries` tool needs directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundarySummary {
    /// Agent name this summary was resolved for.
    pub agent: String,
    /// Whether any boundary config matched.
    pub has_boundary: bool,
    /// Paths the agent is allowed to touch, if a boundary matched.
    #[serde(default)]
    pub allowed_paths: Vec<String>,
    /// Paths denied regardless of `allowed_paths`.
    #[serde(default)]
    pub forbidden_paths: Vec<String>,
    /// Declared enforcement strictness, if a boundary matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforcement: Option<k6s_core::Enforcement>,
    /// Inert resource-limit hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens_per_hour: Option<u64>,
    /// Inert resource-limit hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cost_per_hour: Option<f64>,
}
