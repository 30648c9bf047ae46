//! Key/value context storage, scoped to a session and optionally an
//! agent.

use k6s_core::{AgentId, SessionId};
use k6s_storage::rusqlite::params;

use crate::error::Result;
use crate::manager::StateManager;
use crate::rows::context_from_row;
use crate::types::ContextEntry;
use crate::util::now;

const CONTEXT_COLUMNS: &str = "session_id, key, agent_id, value, updated_at";

impl StateManager {
    /// Upsert a context entry. `updated_at` is always set to the
    /// current time; the column never decreases because rows are only
    /// ever written through this method.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Store`](crate::StateError::Store) on a
    /// storage failure.
    pub async fn save_context(
        &self,
        session_id: &SessionId,
        key: impl Into<String>,
        agent_id: Option<AgentId>,
        value: serde_json::Value,
    ) -> Result<ContextEntry> {
        let entry = ContextEntry {
            session_id: session_id.clone(),
            key: key.into(),
            agent_id,
            value,
            updated_at: now(),
        };
        let row = entry.clone();
        self.store
            .with_connection(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO context_store ({CONTEXT_COLUMNS}) VALUES (?1,?2,?3,?4,?5) \
                         ON CONFLICT(session_id, key) DO UPDATE SET \
                         agent_id = excluded.agent_id, \
                         value = excluded.value, \
                         updated_at = excluded.updated_at"
                    ),
                    params![
                        row.session_id.as_str(),
                        row.key,
                        row.agent_id.as_ref().map(k6s_core::AgentId::as_str),
                        row.value.to_string(),
                        row.updated_at,
                    ],
                )
            })
            .await?;
        Ok(entry)
    }

    /// Load a single context entry by key.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Store`](crate::StateError::Store) on a
    /// storage failure.
    pub async fn load_context(
        &self,
        session_id: &SessionId,
        key: &str,
    ) -> Result<Option<ContextEntry>> {
        let session_id = session_id.as_str().to_string();
        let key = key.to_string();
        let row = self
            .store
            .with_connection(move |conn| {
                conn.query_row(
                    &format!(
                        "SELECT {CONTEXT_COLUMNS} FROM context_store \
                         WHERE session_id = ?1 AND key = ?2"
                    ),
                    params![session_id, key],
                    |row| Ok(context_from_row(row)),
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

    /// Load every context entry for a session, optionally narrowed to
    /// entries saved by a specific agent, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Store`](crate::StateError::Store) on a
    /// storage failure.
    pub async fn load_all_context(
        &self,
        session_id: &SessionId,
        agent_id: Option<&AgentId>,
    ) -> Result<Vec<ContextEntry>> {
        let session_id = session_id.as_str().to_string();
        let agent_id = agent_id.map(|a| a.as_str().to_string());
        let rows = self
            .store
            .with_connection(move |conn| {
                if let Some(agent_id) = agent_id {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {CONTEXT_COLUMNS} FROM context_store \
                         WHERE session_id = ?1 AND agent_id = ?2 ORDER BY key ASC"
                    ))?;
                    stmt.query_map(params![session_id, agent_id], context_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()
                } else {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {CONTEXT_COLUMNS} FROM context_store \
                         WHERE session_id = ?1 ORDER BY key ASC"
                    ))?;
                    stmt.query_map(params![session_id], context_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()
                }
            })
            .await?;
        Ok(rows)
    }

    /// Delete a context entry. No error if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Store`](crate::StateError::Store) on a
    /// storage failure.
    pub async fn delete_context(&self, session_id: &SessionId, key: &str) -> Result<()> {
        let session_id = session_id.as_str().to_string();
        let key = key.to_string();
        self.store
            .with_connection(move |conn| {
                conn.execute(
                    "DELETE FROM context_store WHERE session_id = ?1 AND key = ?2",
                    params![session_id, key],
                )
            })
            .await?;
        Ok(())
    }
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
    async fn save_then_load_roundtrips() {
        let mgr = manager().await;
        let session = mgr.create_session("x", None, None).await.unwrap();
        mgr.save_context(&session.id, "plan", None, serde_json::json!({"step": 1}))
            .await
            .unwrap();
        let loaded = mgr.load_context(&session.id, "plan").await.unwrap().unwrap();
        assert_eq!(loaded.value["step"], 1);
    }

    #[tokio::test]
    async fn save_upserts_on_conflict() {
        let mgr = manager().await;
        let session = mgr.create_session("x", None, None).await.unwrap();
        mgr.save_context(&session.id, "plan", None, serde_json::json!(1))
            .await
            .unwrap();
        mgr.save_context(&session.id, "plan", None, serde_json::json!(2))
            .await
            .unwrap();
        let all = mgr.load_all_context(&session.id, None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].value, serde_json::json!(2));
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let mgr = manager().await;
        let session = mgr.create_session("x", None, None).await.unwrap();
        mgr.save_context(&session.id, "plan", None, serde_json::json!(1))
            .await
            .unwrap();
        mgr.delete_context(&session.id, "plan").await.unwrap();
        assert!(mgr.load_context(&session.id, "plan").await.unwrap().is_none());
    }
}
