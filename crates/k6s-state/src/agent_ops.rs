//! Agent CRUD and lifecycle transitions.

use k6s_core::{AgentId, AgentRole, AgentState, SessionId};
use k6s_storage::rusqlite::params;

use crate::error::{Result, StateError};
use crate::manager::StateManager;
use crate::rows::agent_from_row;
use crate::types::Agent;
use crate::util::now;

const AGENT_COLUMNS: &str = "id, session_id, name, role, specialization, state, spawned_at, \
     boundary_config, metadata";

impl StateManager {
    /// Register a new agent for a session, in the `active` state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Store`] on a storage failure.
    pub async fn create_agent(
        &self,
        session_id: &SessionId,
        name: impl Into<String>,
        role: AgentRole,
        specialization: Option<String>,
        boundary_config: Option<serde_json::Value>,
    ) -> Result<Agent> {
        let agent = Agent {
            id: AgentId::new(),
            session_id: session_id.clone(),
            name: name.into(),
            role,
            specialization,
            state: AgentState::Active,
            spawned_at: now(),
            boundary_config,
            metadata: serde_json::json!({}),
        };
        let row = agent.clone();
        self.store
            .with_connection(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO agents ({AGENT_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)"
                    ),
                    params![
                        row.id.as_str(),
                        row.session_id.as_str(),
                        row.name,
                        row.role.to_string(),
                        row.specialization,
                        row.state.to_string(),
                        row.spawned_at,
                        row.boundary_config.as_ref().map(serde_json::Value::to_string),
                        row.metadata.to_string(),
                    ],
                )
            })
            .await?;
        Ok(agent)
    }

    /// Fetch an agent by id.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Store`] on a storage failure.
    pub async fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>> {
        let id = id.as_str().to_string();
        let row = self
            .store
            .with_connection(move |conn| {
                conn.query_row(
                    &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"),
                    params![id],
                    |row| Ok(agent_from_row(row)),
                )
                .map(Some)
                .or_else(|e| {
                    if matches!(e, k6s_storage::rusqlite::Error::QueryReturnedNoRows) {
                        Ok(None)
                    } else {
                        Err(e)
                    }
                })
                .and_then(|opt| opt.transpose())
            })
            .await?;
        Ok(row)
    }

    /// Fetch an agent by its display name within a session.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Store`] on a storage failure.
    pub async fn get_agent_by_name(
        &self,
        session_id: &SessionId,
        name: &str,
    ) -> Result<Option<Agent>> {
        let session_id = session_id.as_str().to_string();
        let name = name.to_string();
        let row = self
            .store
            .with_connection(move |conn| {
                conn.query_row(
                    &format!(
                        "SELECT {AGENT_COLUMNS} FROM agents WHERE session_id = ?1 AND name = ?2"
                    ),
                    params![session_id, name],
                    |row| Ok(agent_from_row(row)),
                )
                .map(Some)
                .or_else(|e| {
                    if matches!(e, k6s_storage::rusqlite::Error::QueryReturnedNoRows) {
                        Ok(None)
                    } else {
                        Err(e)
                    }
                })
                .and_then(|opt| opt.transpose())
            })
            .await?;
        Ok(row)
    }

    /// List every agent registered against a session, spawn order.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Store`] on a storage failure.
    pub async fn list_agents(&self, session_id: &SessionId) -> Result<Vec<Agent>> {
        let session_id = session_id.as_str().to_string();
        let rows = self
            .store
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {AGENT_COLUMNS} FROM agents WHERE session_id = ?1 ORDER BY spawned_at ASC"
                ))?;
                stmt.query_map(params![session_id], agent_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()
            })
            .await?;
        Ok(rows)
    }

    async fn transition_agent(&self, id: &AgentId, to: AgentState) -> Result<Agent> {
        let Some(agent) = self.get_agent(id).await? else {
            return Err(StateError::AgentNotFound(id.to_string()));
        };
        if !allowed_agent_transition(agent.state, to) {
            return Err(StateError::InvalidAgentTransition {
                agent_id: id.to_string(),
                from: agent.state.to_string(),
                to: to.to_string(),
            });
        }
        let id_str = id.as_str().to_string();
        let to_str = to.to_string();
        self.store
            .with_connection(move |conn| {
                conn.execute(
                    "UPDATE agents SET state = ?1 WHERE id = ?2",
                    params![to_str, id_str],
                )
            })
            .await?;
        Ok(Agent { state: to, ..agent })
    }

    /// Transition to `active`. Valid from `idle`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::AgentNotFound`] or
    /// [`StateError::InvalidAgentTransition`].
    pub async fn mark_agent_active(&self, id: &AgentId) -> Result<Agent> {
        self.transition_agent(id, AgentState::Active).await
    }

    /// Transition to `idle`. Valid from `active`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::AgentNotFound`] or
    /// [`StateError::InvalidAgentTransition`].
    pub async fn mark_agent_idle(&self, id: &AgentId) -> Result<Agent> {
        self.transition_agent(id, AgentState::Idle).await
    }

    /// Transition to `completed`. Valid from `active` or `idle`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::AgentNotFound`] or
    /// [`StateError::InvalidAgentTransition`].
    pub async fn mark_agent_completed(&self, id: &AgentId) -> Result<Agent> {
        self.transition_agent(id, AgentState::Completed).await
    }

    /// Transition to `failed`. Valid from any non-terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::AgentNotFound`] or
    /// [`StateError::InvalidAgentTransition`].
    pub async fn mark_agent_failed(&self, id: &AgentId) -> Result<Agent> {
        self.transition_agent(id, AgentState::Failed).await
    }
}

fn allowed_agent_transition(from: AgentState, to: AgentState) -> bool {
    use AgentState::{Active, Completed, Failed, Idle};
    matches!(
        (from, to),
        (Active, Idle)
            | (Idle, Active)
            | (Active, Completed)
            | (Idle, Completed)
            | (Active, Failed)
            | (Idle, Failed)
    )
}

#[cfg(test)]
mod tests {
    use k6s_storage::Store;

    use super::*;

    async fn manager() -> StateManager {
        let store = Store::open_memory().await.unwrap();
        StateManager::new(store)
    }

    #[tokio::test]
    async fn create_and_fetch_agent() {
        let mgr = manager().await;
        let session = mgr.create_session("x", None, None).await.unwrap();
        let agent = mgr
            .create_agent(&session.id, "frontend-1", AgentRole::Teammate, None, None)
            .await
            .unwrap();
        assert_eq!(agent.state, AgentState::Active);

        let by_name = mgr
            .get_agent_by_name(&session.id, "frontend-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.id, agent.id);
    }

    #[tokio::test]
    async fn agent_lifecycle_rejects_skips() {
        let mgr = manager().await;
        let session = mgr.create_session("x", None, None).await.unwrap();
        let agent = mgr
            .create_agent(&session.id, "a", AgentRole::Lead, None, None)
            .await
            .unwrap();
        let err = mgr.mark_agent_active(&agent.id).await.unwrap_err();
        assert!(matches!(err, StateError::InvalidAgentTransition { .. }));

        mgr.mark_agent_idle(&agent.id).await.unwrap();
        let completed = mgr.mark_agent_completed(&agent.id).await.unwrap();
        assert_eq!(completed.state, AgentState::Completed);
    }

    #[tokio::test]
    async fn list_agents_preserves_spawn_order() {
        let mgr = manager().await;
        let session = mgr.create_session("x", None, None).await.unwrap();
        mgr.create_agent(&session.id, "a", AgentRole::Teammate, None, None)
            .await
            .unwrap();
        mgr.create_agent(&session.id, "b", AgentRole::Teammate, None, None)
            .await
            .unwrap();
        let agents = mgr.list_agents(&session.id).await.unwrap();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].name, "a");
        assert_eq!(agents[1].name, "b");
    }
}
