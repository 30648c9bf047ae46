//! Boundary violation classification.

use serde::{Deserialize, Serialize};

/// Why a path access was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    /// Matched an explicit `forbidden_paths` pattern.
    ForbiddenPath,
    /// `allowed_paths` was non-empty and nothing matched.
    OutsideAllowed,
    /// A `max_tokens_per_hour` / `max_cost_per_hour` budget was exceeded.
    ///
    /// Carried for completeness; no enforcement path populates this
    /// today (see `BoundaryConfig` resource limits).
    ResourceLimit,
}

impl std::fmt::Display for ViolationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ForbiddenPath => "forbidden_path",
            Self::OutsideAllowed => "outside_allowed",
            Self::ResourceLimit => "resource_limit",
        };
        f.write_str(s)
    }
}

/// What the enforcer actually did about a violation.
///
/// Only `Logged` is ever produced today — `Reverted` and `Blocked` are
/// reserved for a future strict-enforcement layer (see the
/// `enforcement` field on `BoundaryConfig`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementAction {
    /// Recorded, no action taken on the file itself.
    Logged,
    /// The triggering change was reverted. Unimplemented.
    Reverted,
    /// The triggering call was blocked outright. Unimplemented.
    Blocked,
}

impl std::fmt::Display for EnforcementAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Logged => "logged",
            Self::Reverted => "reverted",
            Self::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

/// Declared enforcement strictness for a [`crate::BoundaryConfig`]-style
/// policy (defined downstream in `k6s_boundary`; re-exported here since
/// the closed `EnforcementAction` set above mirrors it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enforcement {
    /// Log-and-continue (the only behavior actually implemented).
    Advisory,
    /// Accepted and stored, but produces the same `Logged` action as
    /// `Advisory` until a revert/block plug-in is wired in.
    Strict,
}

impl Default for Enforcement {
    fn default() -> Self {
        Self::Advisory
    }
}

impl std::fmt::Display for Enforcement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Advisory => "advisory",
            Self::Strict => "strict",
        };
        f.write_str(s)
    }
}
