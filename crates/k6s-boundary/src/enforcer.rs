//! Per-agent path access policy.

use std::path::PathBuf;

use k6s_core::{AgentId, EnforcementAction, SessionId, Ulid, ViolationType};
use k6s_storage::rusqlite::{params, Row};
use k6s_storage::Store;
use tracing::warn;

use crate::config::BoundaryConfig;
use crate::error::Result;
use crate::matcher::{glob_match, to_project_relative};
use crate::types::{BoundarySummary, BoundaryViolation, CheckResult};

const VIOLATION_COLUMNS: &str = "id, session_id, agent_id, timestamp, file_path, \
     violation_type, enforcement_action, details";

/// Per-agent allow/forbid glob matching over a project tree, backed by
/// the shared [`Store`] for violation recording.
#[derive(Clone)]
pub struct BoundaryEnforcer {
    store: Store,
    session_id: SessionId,
    project_root: PathBuf,
    configs: Vec<BoundaryConfig>,
}

impl BoundaryEnforcer {
    /// Build an enforcer over an ordered list of boundary configs.
    /// Earlier entries take precedence in agent-name resolution.
    #[must_use]
    pub fn new(
        store: Store,
        session_id: SessionId,
        project_root: PathBuf,
        configs: Vec<BoundaryConfig>,
    ) -> Self {
        Self {
            store,
            session_id,
            project_root,
            configs,
        }
    }

    /// Resolve the boundary config that applies to `agent_name`.
    ///
    /// Scans in order for the first pattern that matches the name
    /// under shell-glob rules; if none match, scans again for a
    /// literal `*` wildcard entry. Returns `None` if neither is found
    /// (access allowed by default).
    #[must_use]
    pub fn resolve_boundary(&self, agent_name: &str) -> Option<&BoundaryConfig> {
        self.configs
            .iter()
            .find(|cfg| glob_match(&cfg.pattern, agent_name))
            .or_else(|| self.configs.iter().find(|cfg| cfg.pattern == "*"))
    }

    /// Check whether `agent_name` may access `path`.
    ///
    /// Does not itself record a violation — callers decide when
    /// enforcement context warrants persisting one, via
    /// [`BoundaryEnforcer::record_violation`].
    #[must_use]
    pub fn check_path_allowed(&self, path: &str, agent_name: &str) -> CheckResult {
        let Some(config) = self.resolve_boundary(agent_name) else {
            return CheckResult::allow();
        };

        let Ok(relative) = to_project_relative(&self.project_root, path) else {
            return CheckResult::deny("outside project root");
        };

        if let Some(pattern) = config
            .forbidden_paths
            .iter()
            .find(|pattern| glob_match(pattern, &relative))
        {
            return CheckResult::deny(format!("matches forbidden pattern {pattern}"));
        }

        if !config.allowed_paths.is_empty()
            && !config
                .allowed_paths
                .iter()
                .any(|pattern| glob_match(pattern, &relative))
        {
            return CheckResult::deny(format!(
                "does not match allowed patterns for {agent_name}"
            ));
        }

        CheckResult::allow()
    }

    /// All configured boundary rules, in resolution order (the
    /// `k6s://boundaries/all` resource).
    #[must_use]
    pub fn all_configs(&self) -> &[BoundaryConfig] {
        &self.configs
    }

    /// The shape the `get_boundaries` tool call needs directly.
    #[must_use]
    pub fn agent_boundaries_summary(&self, agent_name: &str) -> BoundarySummary {
        match self.resolve_boundary(agent_name) {
            Some(config) => BoundarySummary {
                agent: agent_name.to_string(),
                has_boundary: true,
                allowed_paths: config.allowed_paths.clone(),
                forbidden_paths: config.forbidden_paths.clone(),
                enforcement: Some(config.enforcement),
                max_tokens_per_hour: config.max_tokens_per_hour,
                max_cost_per_hour: config.max_cost_per_hour,
            },
            None => BoundarySummary {
                agent: agent_name.to_string(),
                has_boundary: false,
                allowed_paths: Vec::new(),
                forbidden_paths: Vec::new(),
                enforcement: None,
                max_tokens_per_hour: None,
                max_cost_per_hour: None,
            },
        }
    }

    /// Persist a boundary violation.
    ///
    /// Only `EnforcementAction::Logged` is ever produced by this
    /// engine; `Reverted`/`Blocked` are accepted as input since they're
    /// valid [`EnforcementAction`] variants, but nothing in this crate
    /// constructs them.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the insert fails.
    pub async fn record_violation(
        &self,
        agent_id: Option<AgentId>,
        file_path: impl Into<String>,
        violation_type: ViolationType,
        enforcement_action: EnforcementAction,
        details: serde_json::Value,
    ) -> Result<BoundaryViolation> {
        let violation = BoundaryViolation {
            id: Ulid::new().to_string(),
            session_id: self.session_id.clone(),
            agent_id,
            timestamp: now(),
            file_path: file_path.into(),
            violation_type,
            enforcement_action,
            details,
        };
        warn!(
            agent = ?violation.agent_id,
            path = %violation.file_path,
            kind = %violation.violation_type,
            "boundary violation recorded"
        );
        let row = violation.clone();
        self.store
            .with_connection(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO boundary_violations ({VIOLATION_COLUMNS}) \
                         VALUES (?1,?2,?3,?4,?5,?6,?7,?8)"
                    ),
                    params![
                        row.id,
                        row.session_id.as_str(),
                        row.agent_id.as_ref().map(AgentId::as_str),
                        row.timestamp,
                        row.file_path,
                        row.violation_type.to_string(),
                        row.enforcement_action.to_string(),
                        row.details.to_string(),
                    ],
                )
            })
            .await?;
        Ok(violation)
    }

    /// List recorded violations for this session, newest-first,
    /// optionally narrowed to one agent.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn get_violations(
        &self,
        agent_id: Option<&AgentId>,
        limit: u32,
    ) -> Result<Vec<BoundaryViolation>> {
        let session_id = self.session_id.as_str().to_string();
        let agent_id = agent_id.map(|a| a.as_str().to_string());
        let rows = self
            .store
            .with_connection(move |conn| {
                if let Some(agent_id) = agent_id {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {VIOLATION_COLUMNS} FROM boundary_violations \
                         WHERE session_id = ?1 AND agent_id = ?2 \
                         ORDER BY timestamp DESC LIMIT ?3"
                    ))?;
                    stmt.query_map(params![session_id, agent_id, limit], violation_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()
                } else {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {VIOLATION_COLUMNS} FROM boundary_violations \
                         WHERE session_id = ?1 ORDER BY timestamp DESC LIMIT ?2"
                    ))?;
                    stmt.query_map(params![session_id, limit], violation_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()
                }
            })
            .await?;
        Ok(rows)
    }
}

fn violation_from_row(row: &Row) -> std::result::Result<BoundaryViolation, k6s_storage::rusqlite::Error> {
    let violation_type: String = row.get(5)?;
    let enforcement_action: String = row.get(6)?;
    let details: String = row.get(7)?;
    Ok(BoundaryViolation {
        id: row.get(0)?,
        session_id: SessionId::from(row.get::<_, String>(1)?),
        agent_id: row.get::<_, Option<String>>(2)?.map(AgentId::from),
        timestamp: row.get(3)?,
        file_path: row.get(4)?,
        violation_type: parse_violation_type(&violation_type),
        enforcement_action: parse_enforcement_action(&enforcement_action),
        details: serde_json::from_str(&details).unwrap_or(serde_json::Value::Null),
    })
}

fn parse_violation_type(raw: &str) -> ViolationType {
    match raw {
        "outside_allowed" => ViolationType::OutsideAllowed,
        "resource_limit" => ViolationType::ResourceLimit,
        _ => ViolationType::ForbiddenPath,
    }
}

fn parse_enforcement_action(raw: &str) -> EnforcementAction {
    match raw {
        "reverted" => EnforcementAction::Reverted,
        "blocked" => EnforcementAction::Blocked,
        _ => EnforcementAction::Logged,
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use k6s_config::{BoundaryEntry, EnforcementMode};

    use super::*;

    async fn seeded_enforcer(configs: Vec<BoundaryConfig>) -> BoundaryEnforcer {
        let store = Store::open_memory().await.unwrap();
        let session_id = SessionId::new();
        let sid = session_id.as_str().to_string();
        store
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (id, objective, state, started_at) VALUES (?1,'x','created','t')",
                    params![sid],
                )
            })
            .await
            .unwrap();
        BoundaryEnforcer::new(store, session_id, PathBuf::from("/proj"), configs)
    }

    fn entry(pattern: &str, allowed: &[&str], forbidden: &[&str]) -> BoundaryConfig {
        BoundaryConfig::from(BoundaryEntry {
            pattern: pattern.to_string(),
            allowed_paths: allowed.iter().map(|s| (*s).to_string()).collect(),
            forbidden_paths: forbidden.iter().map(|s| (*s).to_string()).collect(),
            enforcement: EnforcementMode::Advisory,
            max_tokens_per_hour: None,
            max_cost_per_hour: None,
        })
    }

    #[tokio::test]
    async fn frontend_rule_scenario() {
        let enforcer = seeded_enforcer(vec![
            entry(
                "frontend-*",
                &["src/frontend/**", "src/shared/**"],
                &[".env*", "src/backend/**"],
            ),
            entry("*", &[], &[".env*"]),
        ])
        .await;

        let allowed = enforcer.check_path_allowed("src/frontend/app.tsx", "frontend-dev");
        assert!(allowed.allowed);

        let backend = enforcer.check_path_allowed("src/backend/api.py", "frontend-dev");
        assert!(!backend.allowed);
        assert!(backend.reason.unwrap().contains("forbidden"));

        let docs = enforcer.check_path_allowed("docs/readme.md", "frontend-dev");
        assert!(!docs.allowed);
        assert!(docs.reason.unwrap().contains("allowed patterns"));

        let env = enforcer.check_path_allowed(".env", "any-agent");
        assert!(!env.allowed);
    }

    #[tokio::test]
    async fn no_matching_boundary_allows_by_default() {
        let enforcer = seeded_enforcer(vec![entry("backend-*", &[], &[])]).await;
        let result = enforcer.check_path_allowed("anything.txt", "frontend-dev");
        assert!(result.allowed);
    }

    #[tokio::test]
    async fn outside_project_root_is_denied() {
        let enforcer = seeded_enforcer(vec![entry("*", &[], &[])]).await;
        let result = enforcer.check_path_allowed("/etc/passwd", "any");
        assert!(!result.allowed);
        assert_eq!(result.reason.unwrap(), "outside project root");
    }

    #[tokio::test]
    async fn record_and_list_violations() {
        let enforcer = seeded_enforcer(vec![entry("*", &[], &[".env*"])]).await;
        enforcer
            .record_violation(
                None,
                ".env",
                ViolationType::ForbiddenPath,
                EnforcementAction::Logged,
                serde_json::json!({"pattern": ".env*"}),
            )
            .await
            .unwrap();
        let violations = enforcer.get_violations(None, 10).await.unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].file_path, ".env");
    }

    #[tokio::test]
    async fn summary_reflects_resolved_boundary() {
        let enforcer = seeded_enforcer(vec![entry("frontend-*", &["src/**"], &[".env*"])]).await;
        let summary = enforcer.agent_boundaries_summary("frontend-dev");
        assert!(summary.has_boundary);
        assert_eq!(summary.allowed_paths, vec!["src/**".to_string()]);

        let none = enforcer.agent_boundaries_summary("backend-dev");
        assert!(!none.has_boundary);
    }
}
