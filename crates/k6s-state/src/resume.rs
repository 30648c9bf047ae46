//! Stable-format resume context, handed to a newly spawned lead agent
//! when it continues a prior session.

use std::fmt::Write as _;

use crate::error::Result;
use crate::manager::StateManager;
use crate::types::Session;

const MAX_CONTEXT_ENTRIES: usize = 10;
const VALUE_PREVIEW_LIMIT: usize = 100;

impl StateManager {
    /// Render a previous session's state into the fixed Markdown shape
    /// a resumed lead agent is handed on startup.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Store`](crate::StateError::Store) on a
    /// storage failure.
    pub async fn generate_resume_context(&self, session: &Session) -> Result<String> {
        let mut out = String::new();
        out.push_str("## Previous Session Context\n\n");
        let _ = writeln!(out, "**Objective**: {}", session.objective);
        let _ = writeln!(out, "**Started**: {}", session.started_at);

        if let Some(summary) = &session.context_summary {
            out.push_str("\n### Session Summary\n\n");
            out.push_str(summary);
            out.push('\n');
        }

        let agents = self.list_agents(&session.id).await?;
        if !agents.is_empty() {
            out.push_str("\n### Active Agents\n\n");
            for agent in &agents {
                let spec = agent
                    .specialization
                    .as_deref()
                    .map_or(String::new(), |s| format!(" ({s})"));
                let _ = writeln!(out, "- **{}**{}: {}", agent.name, spec, agent.state);
            }
        }

        let context = self.load_all_context(&session.id, None).await?;
        if !context.is_empty() {
            out.push_str("\n### Saved Context\n\n");
            for entry in context.iter().take(MAX_CONTEXT_ENTRIES) {
                let preview = preview_value(&entry.value);
                let _ = writeln!(out, "- `{}`: {}", entry.key, preview);
            }
            if context.len() > MAX_CONTEXT_ENTRIES {
                let _ = writeln!(
                    out,
                    "- ... and {} more",
                    context.len() - MAX_CONTEXT_ENTRIES
                );
            }
        }

        Ok(out)
    }
}

fn preview_value(value: &serde_json::Value) -> String {
    let raw = value.to_string();
    if raw.chars().count() <= VALUE_PREVIEW_LIMIT {
        raw
    } else {
        let truncated: String = raw.chars().take(VALUE_PREVIEW_LIMIT).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use k6s_core::AgentRole;
    use k6s_storage::Store;

    use super::*;

    #[tokio::test]
    async fn resume_context_includes_objective_and_context() {
        let store = Store::open_memory().await.unwrap();
        let mgr = StateManager::new(store);
        let session = mgr.create_session("ship the thing", None, None).await.unwrap();
        mgr.create_agent(&session.id, "lead", AgentRole::Lead, None, None)
            .await
            .unwrap();
        mgr.save_context(&session.id, "branch", None, serde_json::json!("feature/x"))
            .await
            .unwrap();

        let text = mgr.generate_resume_context(&session).await.unwrap();
        assert!(text.contains("## Previous Session Context"));
        assert!(text.contains("ship the thing"));
        assert!(text.contains("### Active Agents"));
        assert!(text.contains("lead"));
        assert!(text.contains("### Saved Context"));
        assert!(text.contains("branch"));
    }

    #[tokio::test]
    async fn resume_context_lists_completed_and_failed_agents_too() {
        let store = Store::open_memory().await.unwrap();
        let mgr = StateManager::new(store);
        let session = mgr.create_session("ship the thing", None, None).await.unwrap();
        let lead = mgr
            .create_agent(&session.id, "lead", AgentRole::Lead, None, None)
            .await
            .unwrap();
        mgr.mark_agent_completed(&lead.id).await.unwrap();
        let teammate = mgr
            .create_agent(
                &session.id,
                "auth-dev",
                AgentRole::Teammate,
                Some("auth".to_string()),
                None,
            )
            .await
            .unwrap();
        mgr.mark_agent_failed(&teammate.id).await.unwrap();

        let text = mgr.generate_resume_context(&session).await.unwrap();
        assert!(text.contains("### Active Agents"));
        assert!(text.contains("- **lead**: completed"));
        assert!(text.contains("- **auth-dev** (auth): failed"));
    }

    #[tokio::test]
    async fn resume_context_truncates_long_values() {
        let store = Store::open_memory().await.unwrap();
        let mgr = StateManager::new(store);
        let session = mgr.create_session("x", None, None).await.unwrap();
        let long = "a".repeat(500);
        mgr.save_context(&session.id, "blob", None, serde_json::json!(long))
            .await
            .unwrap();
        let text = mgr.generate_resume_context(&session).await.unwrap();
        assert!(text.contains("..."));
    }

    #[tokio::test]
    async fn resume_context_caps_listed_entries() {
        let store = Store::open_memory().await.unwrap();
        let mgr = StateManager::new(store);
        let session = mgr.create_session("x", None, None).await.unwrap();
        for i in 0..15 {
            mgr.save_context(&session.id, format!("k{i:02}"), None, serde_json::json!(i))
                .await
                .unwrap();
        }
        let text = mgr.generate_resume_context(&session).await.unwrap();
        assert!(text.contains("and 5 more"));
    }
}
