//! The embedded, single-writer SQLite store.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::migrations::MIGRATIONS;

/// A serialized single-writer embedded database.
///
/// All write operations funnel through the internal `Mutex`, which is
/// the sole cross-component serialization point in the engine (spec
/// section 5). Read and write methods both run the actual SQLite call
/// on a blocking task, since `rusqlite` is synchronous.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (creating if absent) the database file at `path`, applying
    /// pragmas and running any pending migrations.
    ///
    /// The containing directory and the file itself are created
    /// owner-only (`0700`/`0600` on unix).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the directory or file can't be
    /// prepared, or a migration error if the schema can't be brought
    /// up to date.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            prepare_directory(dir)?;
        }
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(&path).map_err(|e| StoreError::Open(e.to_string()))?;
            configure(&conn)?;
            set_owner_only_file_permissions(&path)?;
            Ok(conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))??;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open an in-memory database, bypassing directory/file permission
    /// setup entirely. Used by tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the connection can't be
    /// established.
    pub async fn open_memory() -> Result<Self> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection> {
            let conn =
                Connection::open_in_memory().map_err(|e| StoreError::Open(e.to_string()))?;
            configure(&conn)?;
            Ok(conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))??;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    version INTEGER PRIMARY KEY,
                    applied_at TEXT NOT NULL
                )",
                [],
            )?;
            let current: i64 = conn
                .query_row(
                    "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
                    [],
                    |row| row.get(0),
                )
                .unwrap_or(0);

            for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
                debug!(version = migration.version, "applying migration");
                let tx = conn.unchecked_transaction()?;
                tx.execute_batch(migration.sql).map_err(|e| {
                    StoreError::Migration {
                        version: migration.version,
                        reason: e.to_string(),
                    }
                })?;
                tx.execute(
                    "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, chrono_now()],
                )?;
                tx.commit()?;
                info!(version = migration.version, "migration applied");
            }
            Ok(())
        })
        .await
    }

    /// Run `f` against the shared connection on a blocking task.
    ///
    /// This is the primitive every read/write query in the engine is
    /// built on; `f` receives a plain `&Connection`, not a transaction.
    ///
    /// # Errors
    ///
    /// Propagates whatever `f` returns, plus [`StoreError::Task`] if the
    /// blocking task itself panics.
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            f(&guard).map_err(StoreError::from)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Run `f` inside an immediate (write-reserved, `BEGIN IMMEDIATE`)
    /// transaction, committing on `Ok` and rolling back on `Err`.
    ///
    /// This is the correctness pivot for `k6s-lock`'s TOCTOU-free
    /// acquire: the immediate lock is taken before `f` ever reads the
    /// current state, so no other writer can interleave between the
    /// read and the insert.
    ///
    /// # Errors
    ///
    /// Propagates whatever `f` returns, plus transaction begin/commit
    /// failures from `rusqlite`.
    pub async fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let tx = guard
                .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
                .map_err(StoreError::from)?;
            match f(&tx) {
                Ok(value) => {
                    tx.commit().map_err(StoreError::from)?;
                    Ok(value)
                }
                Err(e) => {
                    let _ = tx.rollback();
                    Err(StoreError::from(e))
                }
            }
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

fn chrono_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn prepare_directory(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| StoreError::Open(e.to_string()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
            .map_err(|e| StoreError::Open(e.to_string()))?;
    }
    Ok(())
}

fn set_owner_only_file_permissions(path: &PathBuf) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| StoreError::Open(e.to_string()))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_memory_runs_migrations() {
        let store = Store::open_memory().await.unwrap();
        let count: i64 = store
            .with_connection(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='sessions'",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn open_file_sets_owner_only_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("k6s.db");
        let store = Store::open(&db_path).await.unwrap();
        drop(store);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let file_mode = std::fs::metadata(&db_path).unwrap().permissions().mode() & 0o777;
            assert_eq!(file_mode, 0o600);
            let dir_mode = std::fs::metadata(db_path.parent().unwrap())
                .unwrap()
                .permissions()
                .mode()
                & 0o777;
            assert_eq!(dir_mode, 0o700);
        }
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_error() {
        let store = Store::open_memory().await.unwrap();
        let result: Result<()> = store
            .transaction(|tx| {
                tx.execute(
                    "INSERT INTO sessions (id, objective, state, started_at) VALUES ('s1','o','created','t')",
                    [],
                )?;
                Err(rusqlite::Error::ExecuteReturnedResults)
            })
            .await;
        assert!(result.is_err());

        let count: i64 = store
            .with_connection(|conn| conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
