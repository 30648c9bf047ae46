//! The enforcer-facing boundary policy shape.

use k6s_core::Enforcement;
use k6s_config::{BoundaryEntry, EnforcementMode};
use serde::Serialize;

/// A single `(pattern -> policy)` boundary rule, as held in memory by
/// [`crate::BoundaryEnforcer`].
///
/// Converted once at construction time from [`BoundaryEntry`], the
/// `serde`-facing shape read from [`k6s_config::K6sConfig`].
#[derive(Debug, Clone, Serialize)]
pub struct BoundaryConfig {
    /// Shell-glob matched against agent names (`*` matches any).
    pub pattern: String,
    /// Paths an agent matching `pattern` is allowed to touch.
    pub allowed_paths: Vec<String>,
    /// Paths that are denied regardless of `allowed_paths`.
    pub forbidden_paths: Vec<String>,
    /// Advisory (log-and-continue) or strict (unimplemented revert).
    pub enforcement: Enforcement,
    /// Inert resource-limit hint; no enforcement path exists today.
    pub max_tokens_per_hour: Option<u64>,
    /// Inert resource-limit hint; no enforcement path exists today.
    pub max_cost_per_hour: Option<f64>,
}

impl From<BoundaryEntry> for BoundaryConfig {
    fn from(entry: BoundaryEntry) -> Self {
        Self {
            pattern: entry.pattern,
            allowed_paths: entry.allowed_paths,
            forbidden_paths: entry.forbidden_paths,
            enforcement: match entry.enforcement {
                EnforcementMode::Advisory => Enforcement::Advisory,
                EnforcementMode::Strict => Enforcement::Strict,
            },
            max_tokens_per_hour: entry.max_tokens_per_hour,
            max_cost_per_hour: entry.max_cost_per_hour,
        }
    }
}
