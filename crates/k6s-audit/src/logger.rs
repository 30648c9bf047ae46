//! The buffered, sequenced audit log.

use std::sync::Arc;
use std::time::Duration;

use k6s_core::{AgentId, AuditEvent, AuditEventId, EventType, SessionId};
use k6s_storage::rusqlite::params;
use k6s_storage::Store;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{AuditError, Result};
use crate::rows::{audit_event_from_row, AUDIT_COLUMNS};

/// Flush the buffer once it reaches this many events.
pub const FLUSH_BATCH_SIZE: usize = 100;
/// Flush the buffer after this much time has elapsed since the last flush.
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

struct State {
    sequence: u64,
    buffer: Vec<AuditEvent>,
}

struct Inner {
    store: Store,
    session_id: SessionId,
    state: Mutex<State>,
    worker: Mutex<Option<(JoinHandle<()>, oneshot::Sender<()>)>>,
}

/// Buffered, per-session, monotonic-sequence audit event log.
///
/// One instance is bound to one session. `log()` assigns the next
/// sequence number and appends to an in-memory buffer under a single
/// mutex, so the increment and the append are atomic together; a
/// background task flushes the buffer to the [`Store`] on a 100 ms
/// timer, and `log()` itself flushes immediately once the buffer
/// reaches 100 events.
#[derive(Clone)]
pub struct AuditLogger {
    inner: Arc<Inner>,
}

impl AuditLogger {
    /// Start a logger bound to `session_id`, resuming the sequence
    /// counter from the highest value already stored for that session
    /// (`0` if none) and starting the background flush timer.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Store`] if the resume query fails.
    pub async fn start(store: Store, session_id: SessionId) -> Result<Self> {
        let sid = session_id.as_str().to_string();
        let max_sequence: i64 = store
            .with_connection(move |conn| {
                conn.query_row(
                    "SELECT COALESCE(MAX(sequence), 0) FROM audit_events WHERE session_id = ?1",
                    params![sid],
                    |row| row.get(0),
                )
            })
            .await?;

        let inner = Arc::new(Inner {
            store,
            session_id,
            state: Mutex::new(State {
                sequence: u64::try_from(max_sequence).unwrap_or(0),
                buffer: Vec::new(),
            }),
            worker: Mutex::new(None),
        });

        let logger = Self { inner };
        logger.spawn_flush_worker().await;
        Ok(logger)
    }

    async fn spawn_flush_worker(&self) {
        let mut worker = self.inner.worker.lock().await;
        if worker.is_some() {
            return;
        }
        let (tx, mut rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(FLUSH_INTERVAL);
            interval.tick().await; // first tick fires immediately
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(err) = flush(&inner).await {
                            warn!(error = %err, "background audit flush failed");
                        }
                    }
                    _ = &mut rx => break,
                }
            }
        });
        *worker = Some((handle, tx));
    }

    /// Record one audit event, assigning the next sequence number and
    /// stamping wall-clock time.
    ///
    /// Flushes immediately if the buffer has reached
    /// [`FLUSH_BATCH_SIZE`]; otherwise the event waits for the
    /// background timer or an explicit [`AuditLogger::stop`].
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Store`] if an immediate flush fails.
    pub async fn log(
        &self,
        event_type: EventType,
        action: impl Into<String>,
        agent_id: Option<AgentId>,
        details: Option<serde_json::Value>,
        files_affected: Option<Vec<String>>,
        gate_id: Option<String>,
    ) -> Result<AuditEvent> {
        let event = {
            let mut state = self.inner.state.lock().await;
            state.sequence = state.sequence.saturating_add(1);
            let event = AuditEvent {
                id: AuditEventId::new(),
                session_id: self.inner.session_id.clone(),
                agent_id,
                sequence: state.sequence,
                timestamp: now(),
                event_type,
                action: action.into(),
                details: details.unwrap_or_else(|| serde_json::json!({})),
                files_affected: files_affected.unwrap_or_default(),
                gate_id,
                hmac: None,
            };
            state.buffer.push(event.clone());
            let should_flush = state.buffer.len() >= FLUSH_BATCH_SIZE;
            drop(state);
            if should_flush {
                flush(&self.inner).await?;
            }
            event
        };
        Ok(event)
    }

    /// Record a file-change event (§4.G callers: the watcher).
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Store`] if an immediate flush fails.
    pub async fn log_file_change(
        &self,
        event_type: EventType,
        path: &str,
        old_path: Option<&str>,
    ) -> Result<AuditEvent> {
        let mut details = serde_json::json!({ "path": path });
        if let Some(old_path) = old_path {
            details["old_path"] = serde_json::Value::String(old_path.to_string());
        }
        self.log(
            event_type,
            "file_change",
            None,
            Some(details),
            Some(vec![path.to_string()]),
            None,
        )
        .await
    }

    /// Record a session lifecycle event.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Store`] if an immediate flush fails.
    pub async fn log_session_event(
        &self,
        event_type: EventType,
        detail: impl Into<String>,
    ) -> Result<AuditEvent> {
        self.log(
            event_type,
            "session_event",
            None,
            Some(serde_json::json!({ "detail": detail.into() })),
            None,
            None,
        )
        .await
    }

    /// Record an agent lifecycle event.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Store`] if an immediate flush fails.
    pub async fn log_agent_event(
        &self,
        event_type: EventType,
        agent_id: AgentId,
        detail: impl Into<String>,
    ) -> Result<AuditEvent> {
        self.log(
            event_type,
            "agent_event",
            Some(agent_id),
            Some(serde_json::json!({ "detail": detail.into() })),
            None,
            None,
        )
        .await
    }

    /// Stop the background flush worker and perform a final flush.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Store`] if the final flush fails.
    pub async fn stop(&self) -> Result<()> {
        let worker = self.inner.worker.lock().await.take();
        if let Some((handle, shutdown)) = worker {
            let _ = shutdown.send(());
            let _ = handle.await;
        }
        flush(&self.inner).await
    }

    /// Query stored events, most-recent-sequence-first.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Store`] on a storage failure, or
    /// [`AuditError::Corrupt`] if a row fails to decode.
    pub async fn get_events(
        &self,
        limit: u32,
        offset: u32,
        event_type: Option<EventType>,
        agent_id: Option<&AgentId>,
        since: Option<&str>,
    ) -> Result<Vec<AuditEvent>> {
        let session_id = self.inner.session_id.as_str().to_string();
        let event_type = event_type.map(|t| t.as_str().to_string());
        let agent_id = agent_id.map(|a| a.as_str().to_string());
        let since = since.map(str::to_string);
        let rows = self
            .inner
            .store
            .with_connection(move |conn| {
                let mut sql = format!("SELECT {AUDIT_COLUMNS} FROM audit_events WHERE session_id = ?");
                let mut bound: Vec<Box<dyn k6s_storage::rusqlite::ToSql>> =
                    vec![Box::new(session_id)];
                if let Some(event_type) = event_type {
                    sql.push_str(" AND event_type = ?");
                    bound.push(Box::new(event_type));
                }
                if let Some(agent_id) = agent_id {
                    sql.push_str(" AND agent_id = ?");
                    bound.push(Box::new(agent_id));
                }
                if let Some(since) = since {
                    sql.push_str(" AND timestamp >= ?");
                    bound.push(Box::new(since));
                }
                sql.push_str(" ORDER BY sequence DESC LIMIT ? OFFSET ?");
                bound.push(Box::new(limit));
                bound.push(Box::new(offset));

                let mut stmt = conn.prepare(&sql)?;
                stmt.query_map(
                    k6s_storage::rusqlite::params_from_iter(bound.iter().map(AsRef::as_ref)),
                    audit_event_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()
            })
            .await?;
        Ok(rows)
    }

    /// Total number of events stored for this session.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Store`] on a storage failure.
    pub async fn get_event_count(&self) -> Result<u64> {
        let session_id = self.inner.session_id.as_str().to_string();
        let count: i64 = self
            .inner
            .store
            .with_connection(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM audit_events WHERE session_id = ?1",
                    params![session_id],
                    |row| row.get(0),
                )
            })
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// The session this logger is bound to.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.inner.session_id
    }
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("session_id", &self.inner.session_id)
            .finish_non_exhaustive()
    }
}

async fn flush(inner: &Inner) -> Result<()> {
    let pending = {
        let mut state = inner.state.lock().await;
        if state.buffer.is_empty() {
            return Ok(());
        }
        std::mem::take(&mut state.buffer)
    };
    debug!(count = pending.len(), "flushing audit events");
    inner
        .store
        .with_connection(move |conn| {
            let tx = conn.unchecked_transaction()?;
            for event in &pending {
                tx.execute(
                    &format!(
                        "INSERT INTO audit_events ({AUDIT_COLUMNS}) \
                         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)"
                    ),
                    params![
                        event.id.as_str(),
                        event.session_id.as_str(),
                        event.agent_id.as_ref().map(AgentId::as_str),
                        event.sequence,
                        event.timestamp,
                        event.event_type.as_str(),
                        event.action,
                        event.details.to_string(),
                        serde_json::to_string(&event.files_affected).unwrap_or_default(),
                        event.gate_id,
                        event.hmac,
                    ],
                )?;
            }
            tx.commit()
        })
        .await
        .map_err(AuditError::from)
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
