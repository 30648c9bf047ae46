//! Exclusive file locks with transactional, TOCTOU-free acquisition.

use std::time::Duration;

use k6s_core::{AgentId, SessionId};
use k6s_storage::rusqlite::{params, OptionalExtension, Row};
use k6s_storage::Store;
use tracing::debug;

use crate::error::Result;
use crate::types::{FileLock, LockResult};

/// Default lock duration when the caller doesn't specify one.
pub const DEFAULT_LOCK_DURATION: Duration = Duration::from_secs(300);

const LOCK_COLUMNS: &str = "path, session_id, agent_id, acquired_at, expires_at";

/// Coordinates exclusive file access between concurrent agents within a
/// single session.
#[derive(Clone)]
pub struct LockManager {
    store: Store,
    session_id: SessionId,
}

impl LockManager {
    /// Build a lock manager scoped to `session_id`.
    #[must_use]
    pub fn new(store: Store, session_id: SessionId) -> Self {
        Self { store, session_id }
    }

    /// Acquire an exclusive lock on `path` for `agent_id`.
    ///
    /// Runs inside a single `BEGIN IMMEDIATE` transaction so the read
    /// of the current row and the insert/update are atomic: no other
    /// writer can interleave between "no row" and "insert". See §4.F.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LockError::Store`] on a storage failure.
    /// Contention is not an error — it's a `{success: false, reason}`
    /// value on the returned [`LockResult`].
    pub async fn acquire(
        &self,
        path: &str,
        agent_id: &AgentId,
        duration: Option<Duration>,
    ) -> Result<LockResult> {
        let path = path.to_string();
        let session_id = self.session_id.as_str().to_string();
        let agent_id = agent_id.as_str().to_string();
        let duration = duration.unwrap_or(DEFAULT_LOCK_DURATION);
        let acquired_at = now();
        let expires_at = expiry_string(duration);

        let outcome = self
            .store
            .transaction(move |tx| {
                let existing: Option<(String, Option<String>)> = tx
                    .query_row(
                        "SELECT agent_id, expires_at FROM file_locks \
                         WHERE path = ?1 AND session_id = ?2",
                        params![path, session_id],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;

                match existing {
                    None => {
                        insert_lock(tx, &path, &session_id, &agent_id, &acquired_at, &expires_at)?;
                        Ok(LockResult::ok(path.clone(), Some(expires_at.clone())))
                    }
                    Some((holder, holder_expiry)) if is_expired(holder_expiry.as_deref()) => {
                        tx.execute(
                            "DELETE FROM file_locks WHERE path = ?1 AND session_id = ?2",
                            params![path, session_id],
                        )?;
                        insert_lock(tx, &path, &session_id, &agent_id, &acquired_at, &expires_at)?;
                        Ok(LockResult::ok(path.clone(), Some(expires_at.clone())))
                    }
                    Some((holder, _)) if holder == agent_id => {
                        tx.execute(
                            "UPDATE file_locks SET expires_at = ?1 \
                             WHERE path = ?2 AND session_id = ?3",
                            params![expires_at, path, session_id],
                        )?;
                        Ok(LockResult::ok(path.clone(), Some(expires_at.clone())))
                    }
                    Some((holder, _)) => Ok(LockResult::denied(
                        path.clone(),
                        format!("locked by {holder}"),
                    )),
                }
            })
            .await?;

        debug!(path = %outcome.lock_token, success = outcome.success, "lock acquire");
        Ok(outcome)
    }

    /// Release a lock held by `agent_id`.
    ///
    /// Succeeds silently (with an informational reason) if no lock
    /// exists; fails if the lock is held by a different agent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LockError::Store`] on a storage failure.
    pub async fn release(&self, path: &str, agent_id: &AgentId) -> Result<LockResult> {
        let path_owned = path.to_string();
        let session_id = self.session_id.as_str().to_string();
        let agent_id_owned = agent_id.as_str().to_string();

        let outcome = self
            .store
            .transaction(move |tx| {
                let holder: Option<String> = tx
                    .query_row(
                        "SELECT agent_id FROM file_locks WHERE path = ?1 AND session_id = ?2",
                        params![path_owned, session_id],
                        |row| row.get(0),
                    )
                    .optional()?;

                match holder {
                    None => Ok(LockResult::ok_with_reason(
                        path_owned.clone(),
                        "Lock not found (already released)",
                    )),
                    Some(holder) if holder == agent_id_owned => {
                        tx.execute(
                            "DELETE FROM file_locks WHERE path = ?1 AND session_id = ?2",
                            params![path_owned, session_id],
                        )?;
                        Ok(LockResult::ok(path_owned.clone(), None))
                    }
                    Some(holder) => Ok(LockResult::denied(
                        path_owned.clone(),
                        format!("locked by {holder}"),
                    )),
                }
            })
            .await?;

        Ok(outcome)
    }

    /// Look up the lock on `path`, sweeping it away and returning
    /// `None` if it has expired.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LockError::Store`] on a storage failure.
    pub async fn check(&self, path: &str) -> Result<Option<FileLock>> {
        let path_owned = path.to_string();
        let session_id = self.session_id.as_str().to_string();
        let lock = self
            .store
            .with_connection(move |conn| {
                conn.query_row(
                    &format!(
                        "SELECT {LOCK_COLUMNS} FROM file_locks WHERE path = ?1 AND session_id = ?2"
                    ),
                    params![path_owned, session_id],
                    lock_from_row,
                )
                .optional()
            })
            .await?;

        let Some(lock) = lock else { return Ok(None) };
        if is_expired(lock.expires_at.as_deref()) {
            self.sweep(&lock.path).await?;
            return Ok(None);
        }
        Ok(Some(lock))
    }

    /// List currently-active locks, optionally narrowed to one agent,
    /// garbage-collecting any expired locks encountered along the way.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LockError::Store`] on a storage failure.
    pub async fn list_locks(&self, agent_id: Option<&AgentId>) -> Result<Vec<FileLock>> {
        let session_id = self.session_id.as_str().to_string();
        let agent_id = agent_id.map(|a| a.as_str().to_string());
        let rows: Vec<FileLock> = self
            .store
            .with_connection(move |conn| {
                if let Some(agent_id) = agent_id {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {LOCK_COLUMNS} FROM file_locks \
                         WHERE session_id = ?1 AND agent_id = ?2"
                    ))?;
                    stmt.query_map(params![session_id, agent_id], lock_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()
                } else {
                    let mut stmt = conn
                        .prepare(&format!("SELECT {LOCK_COLUMNS} FROM file_locks WHERE session_id = ?1"))?;
                    stmt.query_map(params![session_id], lock_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()
                }
            })
            .await?;

        let mut active = Vec::with_capacity(rows.len());
        for lock in rows {
            if is_expired(lock.expires_at.as_deref()) {
                self.sweep(&lock.path).await?;
            } else {
                active.push(lock);
            }
        }
        Ok(active)
    }

    /// Release every lock held by `agent_id` in this session.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LockError::Store`] on a storage failure.
    pub async fn release_all_for_agent(&self, agent_id: &AgentId) -> Result<()> {
        let session_id = self.session_id.as_str().to_string();
        let agent_id = agent_id.as_str().to_string();
        self.store
            .with_connection(move |conn| {
                conn.execute(
                    "DELETE FROM file_locks WHERE session_id = ?1 AND agent_id = ?2",
                    params![session_id, agent_id],
                )
            })
            .await?;
        Ok(())
    }

    /// Release every lock in this session.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LockError::Store`] on a storage failure.
    pub async fn release_all(&self) -> Result<()> {
        let session_id = self.session_id.as_str().to_string();
        self.store
            .with_connection(move |conn| {
                conn.execute(
                    "DELETE FROM file_locks WHERE session_id = ?1",
                    params![session_id],
                )
            })
            .await?;
        Ok(())
    }

    async fn sweep(&self, path: &str) -> Result<()> {
        let path = path.to_string();
        let session_id = self.session_id.as_str().to_string();
        self.store
            .with_connection(move |conn| {
                conn.execute(
                    "DELETE FROM file_locks WHERE path = ?1 AND session_id = ?2",
                    params![path, session_id],
                )
            })
            .await?;
        Ok(())
    }
}

fn insert_lock(
    tx: &k6s_storage::rusqlite::Transaction<'_>,
    path: &str,
    session_id: &str,
    agent_id: &str,
    acquired_at: &str,
    expires_at: &str,
) -> k6s_storage::rusqlite::Result<()> {
    tx.execute(
        &format!("INSERT INTO file_locks ({LOCK_COLUMNS}) VALUES (?1,?2,?3,?4,?5)"),
        params![path, session_id, agent_id, acquired_at, expires_at],
    )?;
    Ok(())
}

fn lock_from_row(row: &Row) -> std::result::Result<FileLock, k6s_storage::rusqlite::Error> {
    Ok(FileLock {
        path: row.get(0)?,
        session_id: SessionId::from(row.get::<_, String>(1)?),
        agent_id: AgentId::from(row.get::<_, String>(2)?),
        acquired_at: row.get(3)?,
        expires_at: row.get(4)?,
    })
}

fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

fn expiry_string(duration: Duration) -> String {
    let delta = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
    (now() + delta).to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn is_expired(expires_at: Option<&str>) -> bool {
    let Some(expires_at) = expires_at else {
        return false; // null expiry is immortal
    };
    match chrono::DateTime::parse_from_rfc3339(expires_at) {
        Ok(expiry) => expiry.with_timezone(&chrono::Utc) < now(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use k6s_storage::Store;

    use super::*;

    async fn seeded_manager() -> LockManager {
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
        LockManager::new(store, session_id)
    }

    #[tokio::test]
    async fn mutual_exclusion_scenario() {
        let manager = seeded_manager().await;
        let a = AgentId::new();
        let b = AgentId::new();

        let first = manager.acquire("src/x.rs", &a, None).await.unwrap();
        assert!(first.success);

        let second = manager.acquire("src/x.rs", &b, None).await.unwrap();
        assert!(!second.success);
        assert!(second.reason.unwrap().contains("locked by"));

        manager.release("src/x.rs", &a).await.unwrap();
        let third = manager.acquire("src/x.rs", &b, None).await.unwrap();
        assert!(third.success);
    }

    #[tokio::test]
    async fn re_entrant_acquire_then_clean_release() {
        let manager = seeded_manager().await;
        let a = AgentId::new();

        assert!(manager.acquire("p", &a, None).await.unwrap().success);
        assert!(manager.acquire("p", &a, None).await.unwrap().success);
        manager.release("p", &a).await.unwrap();
        assert!(manager.check("p").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn release_without_lock_succeeds_silently() {
        let manager = seeded_manager().await;
        let a = AgentId::new();
        let result = manager.release("nowhere", &a).await.unwrap();
        assert!(result.success);
        assert!(result.reason.unwrap().contains("already released"));
    }

    #[tokio::test]
    async fn release_by_non_holder_is_denied() {
        let manager = seeded_manager().await;
        let a = AgentId::new();
        let b = AgentId::new();
        manager.acquire("p", &a, None).await.unwrap();
        let result = manager.release("p", &b).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn expired_lock_is_reacquirable() {
        let manager = seeded_manager().await;
        let a = AgentId::new();
        let b = AgentId::new();
        manager
            .acquire("p", &a, Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let result = manager.acquire("p", &b, None).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn list_locks_filters_by_agent_and_gcs_expired() {
        let manager = seeded_manager().await;
        let a = AgentId::new();
        let b = AgentId::new();
        manager.acquire("a.rs", &a, None).await.unwrap();
        manager
            .acquire("b.rs", &b, Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let all = manager.list_locks(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].path, "a.rs");

        let for_a = manager.list_locks(Some(&a)).await.unwrap();
        assert_eq!(for_a.len(), 1);
    }

    #[tokio::test]
    async fn release_all_for_agent_clears_only_that_agents_locks() {
        let manager = seeded_manager().await;
        let a = AgentId::new();
        let b = AgentId::new();
        manager.acquire("a.rs", &a, None).await.unwrap();
        manager.acquire("b.rs", &b, None).await.unwrap();

        manager.release_all_for_agent(&a).await.unwrap();
        assert!(manager.check("a.rs").await.unwrap().is_none());
        assert!(manager.check("b.rs").await.unwrap().is_some());
    }
}
