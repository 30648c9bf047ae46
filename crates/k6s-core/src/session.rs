//! Session lifecycle state.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a governance session.
///
/// Transitions are linear except `Active <-> Paused`; `Completed` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Row exists, no work has started yet.
    Created,
    /// Actively governing agent activity.
    Active,
    /// Temporarily suspended; can resume to `Active`.
    Paused,
    /// Terminal: finished successfully.
    Completed,
    /// Terminal: finished with an error.
    Failed,
}

impl SessionState {
    /// Terminal states set `ended_at` and reject further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for SessionState {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(crate::error::CoreError::UnknownVariant {
                kind: "session_state",
                value: other.to_string(),
            }),
        }
    }
}

/// Role an agent was spawned under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Drives the session; typically one per session.
    Lead,
    /// A spawned collaborator scoped by a boundary.
    Teammate,
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Lead => "lead",
            Self::Teammate => "teammate",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for AgentRole {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lead" => Ok(Self::Lead),
            "teammate" => Ok(Self::Teammate),
            other => Err(crate::error::CoreError::UnknownVariant {
                kind: "agent_role",
                value: other.to_string(),
            }),
        }
    }
}

/// Lifecycle state of an agent within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Currently doing work.
    Active,
    /// Spawned but not currently doing work.
    Idle,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for AgentState {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "idle" => Ok(Self::Idle),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(crate::error::CoreError::UnknownVariant {
                kind: "agent_state",
                value: other.to_string(),
            }),
        }
    }
}
