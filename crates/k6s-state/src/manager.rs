//! Session CRUD and lifecycle transitions.

use k6s_core::{SessionId, SessionState};
use k6s_storage::rusqlite::params;
use k6s_storage::Store;

use crate::error::{Result, StateError};
use crate::rows::session_from_row;
use crate::types::Session;
use crate::util::now;

const SESSION_COLUMNS: &str = "id, objective, state, started_at, ended_at, parent_session_id, \
     config_snapshot, context_summary, total_cost_usd, total_input_tokens, \
     total_output_tokens, metadata";

/// Session, agent, and context CRUD over a shared [`Store`].
#[derive(Clone)]
pub struct StateManager {
    pub(crate) store: Store,
}

impl StateManager {
    /// Build a manager over an already-open store.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Create a new session in the `created` state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Store`] on a storage failure.
    pub async fn create_session(
        &self,
        objective: impl Into<String>,
        config_snapshot: Option<serde_json::Value>,
        parent: Option<SessionId>,
    ) -> Result<Session> {
        let session = Session {
            id: SessionId::new(),
            objective: objective.into(),
            state: SessionState::Created,
            started_at: now(),
            ended_at: None,
            parent_session_id: parent,
            config_snapshot,
            context_summary: None,
            total_cost_usd: 0.0,
            total_input_tokens: 0,
            total_output_tokens: 0,
            metadata: serde_json::json!({}),
        };
        let row = session.clone();
        self.store
            .with_connection(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO sessions ({SESSION_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)"
                    ),
                    params![
                        row.id.as_str(),
                        row.objective,
                        row.state.to_string(),
                        row.started_at,
                        row.ended_at,
                        row.parent_session_id.as_ref().map(k6s_core::SessionId::as_str),
                        row.config_snapshot.as_ref().map(serde_json::Value::to_string),
                        row.context_summary,
                        row.total_cost_usd,
                        row.total_input_tokens,
                        row.total_output_tokens,
                        row.metadata.to_string(),
                    ],
                )
            })
            .await?;
        Ok(session)
    }

    /// Fetch a session by id.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Store`] on a storage failure.
    pub async fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
        let id = id.as_str().to_string();
        let row = self
            .store
            .with_connection(move |conn| {
                conn.query_row(
                    &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                    params![id],
                    |row| Ok(session_from_row(row)),
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

    /// The most recently started session, regardless of state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Store`] on a storage failure.
    pub async fn get_latest_session(&self) -> Result<Option<Session>> {
        let row = self
            .store
            .with_connection(move |conn| {
                conn.query_row(
                    &format!(
                        "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY started_at DESC LIMIT 1"
                    ),
                    [],
                    |row| Ok(session_from_row(row)),
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

    /// The newest session whose state is `created` or `active`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Store`] on a storage failure.
    pub async fn get_active_session(&self) -> Result<Option<Session>> {
        let row = self
            .store
            .with_connection(move |conn| {
                conn.query_row(
                    &format!(
                        "SELECT {SESSION_COLUMNS} FROM sessions \
                         WHERE state IN ('created', 'active') \
                         ORDER BY started_at DESC LIMIT 1"
                    ),
                    [],
                    |row| Ok(session_from_row(row)),
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

    /// List sessions newest-first, optionally filtered by state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Store`] on a storage failure.
    pub async fn list_sessions(
        &self,
        limit: u32,
        offset: u32,
        state: Option<SessionState>,
    ) -> Result<Vec<Session>> {
        let rows = self
            .store
            .with_connection(move |conn| {
                let sql = if state.is_some() {
                    format!(
                        "SELECT {SESSION_COLUMNS} FROM sessions WHERE state = ?1 \
                         ORDER BY started_at DESC LIMIT ?2 OFFSET ?3"
                    )
                } else {
                    format!(
                        "SELECT {SESSION_COLUMNS} FROM sessions \
                         ORDER BY started_at DESC LIMIT ?1 OFFSET ?2"
                    )
                };
                let mut stmt = conn.prepare(&sql)?;
                let mapped = if let Some(state) = state {
                    stmt.query_map(params![state.to_string(), limit, offset], session_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                } else {
                    stmt.query_map(params![limit, offset], session_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                };
                Ok(mapped)
            })
            .await?;
        Ok(rows)
    }

    async fn transition_session(&self, id: &SessionId, to: SessionState) -> Result<Session> {
        let Some(session) = self.get_session(id).await? else {
            return Err(StateError::SessionNotFound(id.to_string()));
        };
        if !allowed_session_transition(session.state, to) {
            return Err(StateError::InvalidSessionTransition {
                session_id: id.to_string(),
                from: session.state.to_string(),
                to: to.to_string(),
            });
        }
        let ended_at = if to.is_terminal() { Some(now()) } else { None };
        let id_str = id.as_str().to_string();
        let to_str = to.to_string();
        let ended_clone = ended_at.clone();
        self.store
            .with_connection(move |conn| {
                conn.execute(
                    "UPDATE sessions SET state = ?1, ended_at = COALESCE(?2, ended_at) WHERE id = ?3",
                    params![to_str, ended_clone, id_str],
                )
            })
            .await?;
        Ok(Session {
            state: to,
            ended_at: ended_at.or(session.ended_at),
            ..session
        })
    }

    /// Transition to `active`. Valid from `created` or `paused`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::SessionNotFound`] or
    /// [`StateError::InvalidSessionTransition`].
    pub async fn mark_session_active(&self, id: &SessionId) -> Result<Session> {
        self.transition_session(id, SessionState::Active).await
    }

    /// Transition to `paused`. Valid from `active`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::SessionNotFound`] or
    /// [`StateError::InvalidSessionTransition`].
    pub async fn mark_session_paused(&self, id: &SessionId) -> Result<Session> {
        self.transition_session(id, SessionState::Paused).await
    }

    /// Transition to `completed`, stamping `ended_at`. Valid from
    /// `active` or `paused`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::SessionNotFound`] or
    /// [`StateError::InvalidSessionTransition`].
    pub async fn mark_session_completed(&self, id: &SessionId) -> Result<Session> {
        self.transition_session(id, SessionState::Completed).await
    }

    /// Transition to `failed`, stamping `ended_at`. Valid from any
    /// non-terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::SessionNotFound`] or
    /// [`StateError::InvalidSessionTransition`].
    pub async fn mark_session_failed(&self, id: &SessionId) -> Result<Session> {
        self.transition_session(id, SessionState::Failed).await
    }

    /// Set the carry-over summary a resumed session was handed from
    /// its parent. Called once, right after creation.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Store`] on a storage failure.
    pub async fn set_context_summary(
        &self,
        id: &SessionId,
        summary: impl Into<String>,
    ) -> Result<()> {
        let id = id.as_str().to_string();
        let summary = summary.into();
        self.store
            .with_connection(move |conn| {
                conn.execute(
                    "UPDATE sessions SET context_summary = ?1 WHERE id = ?2",
                    params![summary, id],
                )
            })
            .await?;
        Ok(())
    }
}

fn allowed_session_transition(from: SessionState, to: SessionState) -> bool {
    use SessionState::{Active, Completed, Created, Failed, Paused};
    matches!(
        (from, to),
        (Created, Active)
            | (Active, Paused)
            | (Paused, Active)
            | (Active, Completed)
            | (Paused, Completed)
            | (Created, Completed)
            | (Active, Failed)
            | (Paused, Failed)
            | (Created, Failed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn manager() -> StateManager {
        let store = Store::open_memory().await.unwrap();
        StateManager::new(store)
    }

    #[tokio::test]
    async fn create_and_fetch_session() {
        let mgr = manager().await;
        let session = mgr.create_session("build auth", None, None).await.unwrap();
        assert_eq!(session.state, SessionState::Created);
        let fetched = mgr.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.objective, "build auth");
    }

    #[tokio::test]
    async fn active_session_resolution() {
        let mgr = manager().await;
        let s1 = mgr.create_session("first", None, None).await.unwrap();
        mgr.mark_session_active(&s1.id).await.unwrap();
        mgr.mark_session_completed(&s1.id).await.unwrap();
        let s2 = mgr.create_session("second", None, None).await.unwrap();
        mgr.mark_session_active(&s2.id).await.unwrap();

        let active = mgr.get_active_session().await.unwrap().unwrap();
        assert_eq!(active.id, s2.id);
    }

    #[tokio::test]
    async fn invalid_transition_is_rejected() {
        let mgr = manager().await;
        let session = mgr.create_session("x", None, None).await.unwrap();
        let err = mgr.mark_session_paused(&session.id).await.unwrap_err();
        assert!(matches!(err, StateError::InvalidSessionTransition { .. }));
    }

    #[tokio::test]
    async fn context_summary_is_stored_and_fetchable() {
        let mgr = manager().await;
        let session = mgr.create_session("x", None, None).await.unwrap();
        assert!(session.context_summary.is_none());
        mgr.set_context_summary(&session.id, "carried over").await.unwrap();
        let fetched = mgr.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.context_summary.as_deref(), Some("carried over"));
    }

    #[tokio::test]
    async fn completed_session_has_ended_at() {
        let mgr = manager().await;
        let session = mgr.create_session("x", None, None).await.unwrap();
        mgr.mark_session_active(&session.id).await.unwrap();
        let done = mgr.mark_session_completed(&session.id).await.unwrap();
        assert!(done.ended_at.is_some());
        assert!(done.ended_at.unwrap() >= done.started_at);
    }
}
