//! k6s Audit - the buffered, monotonic-sequence audit log.
//!
//! One [`AuditLogger`] is bound to one session. It owns the sequence
//! counter (the other piece of shared mutable state in the engine,
//! alongside the [`k6s_storage::Store`] write mutex) and buffers events
//! in memory until a size or time threshold is crossed, per §4.D of the
//! governance model.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod export;
mod logger;
mod rows;

pub use error::{AuditError, Result};
pub use logger::{AuditLogger, FLUSH_BATCH_SIZE, FLUSH_INTERVAL};

#[cfg(test)]
mod tests {
    use k6s_core::{AgentId, EventType, SessionId};
    use k6s_storage::Store;

    use super::*;

    async fn seeded_store() -> (Store, SessionId) {
        let store = Store::open_memory().await.unwrap();
        let session_id = SessionId::new();
        let sid = session_id.as_str().to_string();
        store
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (id, objective, state, started_at) VALUES (?1,'x','created','t')",
                    k6s_storage::rusqlite::params![sid],
                )
            })
            .await
            .unwrap();
        (store, session_id)
    }

    #[tokio::test]
    async fn sequence_is_gap_free_under_contention() {
        let (store, session_id) = seeded_store().await;
        let logger = AuditLogger::start(store, session_id).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..200 {
            let logger = logger.clone();
            handles.push(tokio::spawn(async move {
                logger
                    .log(EventType::Log, format!("call-{i}"), None, None, None, None)
                    .await
                    .unwrap()
            }));
        }
        let mut sequences: Vec<u64> = Vec::new();
        for handle in handles {
            sequences.push(handle.await.unwrap().sequence);
        }
        logger.stop().await.unwrap();

        sequences.sort_unstable();
        let expected: Vec<u64> = (1..=200).collect();
        assert_eq!(sequences, expected);
        assert_eq!(logger.get_event_count().await.unwrap(), 200);
    }

    #[tokio::test]
    async fn restart_continues_sequence() {
        let (store, session_id) = seeded_store().await;
        {
            let logger = AuditLogger::start(store.clone(), session_id.clone())
                .await
                .unwrap();
            for i in 0..7 {
                logger
                    .log(EventType::Log, format!("call-{i}"), None, None, None, None)
                    .await
                    .unwrap();
            }
            logger.stop().await.unwrap();
        }
        let logger = AuditLogger::start(store, session_id).await.unwrap();
        let event = logger
            .log(EventType::Log, "next", None, None, None, None)
            .await
            .unwrap();
        assert_eq!(event.sequence, 8);
        logger.stop().await.unwrap();
    }

    #[tokio::test]
    async fn get_events_filters_by_agent_and_type() {
        let (store, session_id) = seeded_store().await;
        let logger = AuditLogger::start(store, session_id).await.unwrap();
        let agent = AgentId::new();
        logger
            .log(EventType::Log, "plain", None, None, None, None)
            .await
            .unwrap();
        logger
            .log(
                EventType::LockAcquired,
                "lock",
                Some(agent.clone()),
                None,
                None,
                None,
            )
            .await
            .unwrap();
        logger.stop().await.unwrap();

        let by_type = logger
            .get_events(10, 0, Some(EventType::LockAcquired), None, None)
            .await
            .unwrap();
        assert_eq!(by_type.len(), 1);
        assert_eq!(by_type[0].action, "lock");

        let by_agent = logger.get_events(10, 0, None, Some(&agent), None).await.unwrap();
        assert_eq!(by_agent.len(), 1);

        let descending = logger.get_events(10, 0, None, None, None).await.unwrap();
        assert_eq!(descending[0].sequence, 2);
        assert_eq!(descending[1].sequence, 1);
    }

    #[tokio::test]
    async fn flushes_on_batch_size() {
        let (store, session_id) = seeded_store().await;
        let logger = AuditLogger::start(store.clone(), session_id.clone())
            .await
            .unwrap();
        for i in 0..FLUSH_BATCH_SIZE {
            logger
                .log(EventType::Log, format!("call-{i}"), None, None, None, None)
                .await
                .unwrap();
        }
        // The batch-size flush happened synchronously inside log(), no
        // need to wait for the timer or call stop() first.
        let sid = session_id.as_str().to_string();
        let stored: i64 = store
            .with_connection(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM audit_events WHERE session_id = ?1",
                    k6s_storage::rusqlite::params![sid],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(stored, i64::try_from(FLUSH_BATCH_SIZE).unwrap());
        logger.stop().await.unwrap();
    }
}
