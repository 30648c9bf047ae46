//! The closed set of audit event types.

use serde::{Deserialize, Serialize};

/// Every kind of event the audit log can record.
///
/// This set is closed: the [`AuditLogger`](../k6s_audit/index.html)
/// tool-call entry point falls back to [`EventType::Log`] for any
/// caller-supplied string that doesn't match a known variant, rather
/// than widening the enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A file was created.
    FileCreate,
    /// A file was modified.
    FileModify,
    /// A file was deleted.
    FileDelete,
    /// A session transitioned to active.
    SessionStart,
    /// A session transitioned to paused.
    SessionPause,
    /// A session transitioned from paused back to active.
    SessionResume,
    /// A session completed successfully.
    SessionComplete,
    /// A session failed.
    SessionFail,
    /// An agent was registered.
    AgentSpawn,
    /// An agent finished successfully.
    AgentComplete,
    /// An agent finished with an error.
    AgentFail,
    /// A task was created.
    TaskCreate,
    /// A task's status or progress changed.
    TaskUpdate,
    /// A task completed.
    TaskComplete,
    /// A gate was triggered.
    GateTriggered,
    /// A gate was approved.
    GateApproved,
    /// A gate was denied.
    GateDenied,
    /// A gate timed out waiting for a decision.
    GateExpired,
    /// A boundary violation was recorded.
    BoundaryViolation,
    /// A boundary check was performed (allowed or denied).
    BoundaryCheck,
    /// A file lock was acquired.
    LockAcquired,
    /// A file lock was released.
    LockReleased,
    /// A lock acquisition was denied.
    LockDenied,
    /// A context entry was saved.
    ContextSaved,
    /// A context entry was loaded.
    ContextLoaded,
    /// Cost/usage was reported.
    CostReported,
    /// A budget warning threshold was crossed.
    BudgetWarning,
    /// A budget limit was exceeded.
    BudgetExceeded,
    /// Generic log entry; the fallback for unrecognized event types.
    Log,
    /// Engine-internal system event.
    System,
    /// A tool call was made.
    ToolUse,
}

impl EventType {
    /// All variants, in declaration order — used to validate incoming
    /// strings against the closed set.
    pub const ALL: &'static [Self] = &[
        Self::FileCreate,
        Self::FileModify,
        Self::FileDelete,
        Self::SessionStart,
        Self::SessionPause,
        Self::SessionResume,
        Self::SessionComplete,
        Self::SessionFail,
        Self::AgentSpawn,
        Self::AgentComplete,
        Self::AgentFail,
        Self::TaskCreate,
        Self::TaskUpdate,
        Self::TaskComplete,
        Self::GateTriggered,
        Self::GateApproved,
        Self::GateDenied,
        Self::GateExpired,
        Self::BoundaryViolation,
        Self::BoundaryCheck,
        Self::LockAcquired,
        Self::LockReleased,
        Self::LockDenied,
        Self::ContextSaved,
        Self::ContextLoaded,
        Self::CostReported,
        Self::BudgetWarning,
        Self::BudgetExceeded,
        Self::Log,
        Self::System,
        Self::ToolUse,
    ];

    /// Parse from the wire string, falling back to [`EventType::Log`]
    /// for anything not in the closed set (per the ToolServer `log`
    /// contract).
    #[must_use]
    pub fn parse_or_log(raw: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|variant| variant.as_str() == raw)
            .unwrap_or(Self::Log)
    }

    /// The `snake_case` wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileCreate => "file_create",
            Self::FileModify => "file_modify",
            Self::FileDelete => "file_delete",
            Self::SessionStart => "session_start",
            Self::SessionPause => "session_pause",
            Self::SessionResume => "session_resume",
            Self::SessionComplete => "session_complete",
            Self::SessionFail => "session_fail",
            Self::AgentSpawn => "agent_spawn",
            Self::AgentComplete => "agent_complete",
            Self::AgentFail => "agent_fail",
            Self::TaskCreate => "task_create",
            Self::TaskUpdate => "task_update",
            Self::TaskComplete => "task_complete",
            Self::GateTriggered => "gate_triggered",
            Self::GateApproved => "gate_approved",
            Self::GateDenied => "gate_denied",
            Self::GateExpired => "gate_expired",
            Self::BoundaryViolation => "boundary_violation",
            Self::BoundaryCheck => "boundary_check",
            Self::LockAcquired => "lock_acquired",
            Self::LockReleased => "lock_released",
            Self::LockDenied => "lock_denied",
            Self::ContextSaved => "context_saved",
            Self::ContextLoaded => "context_loaded",
            Self::CostReported => "cost_reported",
            Self::BudgetWarning => "budget_warning",
            Self::BudgetExceeded => "budget_exceeded",
            Self::Log => "log",
            Self::System => "system",
            Self::ToolUse => "tool_use",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_string_falls_back_to_log() {
        assert_eq!(EventType::parse_or_log("not_a_real_type"), EventType::Log);
    }

    #[test]
    fn known_strings_round_trip() {
        for variant in EventType::ALL {
            assert_eq!(EventType::parse_or_log(variant.as_str()), *variant);
        }
    }
}
