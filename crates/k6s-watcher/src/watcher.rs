//! The native-thread filesystem observer and its bridge into the async
//! runtime.

use std::path::PathBuf;

use k6s_audit::AuditLogger;
use k6s_boundary::BoundaryEnforcer;
use k6s_core::{EnforcementAction, ViolationType};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::classify::classify;
use crate::error::{Result, WatcherError};
use crate::events::FileChangeEvent;

/// Bound on the raw event queue bridging the `notify` callback thread
/// into the async runtime. Once full, further events are dropped —
/// the watcher is a redundant safety net, not the system of record.
const QUEUE_CAPACITY: usize = 1024;

/// The synthetic agent identity under which watcher-detected changes
/// are checked against boundaries and, if denied, recorded.
pub const WATCHER_AGENT_NAME: &str = "*";

/// Recursively observes a project tree and turns raw filesystem
/// activity into synthetic `file_create`/`file_modify`/`file_delete`
/// events, forwarded to the audit log and cross-checked against
/// boundaries.
pub struct FileWatcher {
    project_root: PathBuf,
    /// Kept alive for the watcher's lifetime; dropping it stops
    /// filesystem monitoring.
    _watcher: RecommendedWatcher,
    raw_rx: mpsc::Receiver<notify::Result<Event>>,
}

impl FileWatcher {
    /// Start watching `project_root` recursively on a native thread.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::Backend`] if the underlying `notify`
    /// backend can't be initialized or can't watch the root.
    pub fn start(project_root: PathBuf) -> Result<Self> {
        let (raw_tx, raw_rx) = mpsc::channel(QUEUE_CAPACITY);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                if raw_tx.try_send(res).is_err() {
                    // Queue full or receiver dropped — drop the event.
                    // This is the documented last-resort behavior.
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| WatcherError::Backend(e.to_string()))?;

        watcher
            .watch(&project_root, RecursiveMode::Recursive)
            .map_err(|e| WatcherError::Backend(e.to_string()))?;

        Ok(Self {
            project_root,
            _watcher: watcher,
            raw_rx,
        })
    }

    /// Run the event loop until the raw channel closes (the watcher is
    /// dropped) or `stop` fires.
    ///
    /// Every kept event is forwarded to `audit` as a `file_*` audit
    /// event, then checked against `boundary` under the synthetic
    /// agent identity [`WATCHER_AGENT_NAME`]; a denial is recorded with
    /// `agent_id = None` and `enforcement_action = logged`.
    pub async fn run(
        mut self,
        audit: AuditLogger,
        boundary: BoundaryEnforcer,
        mut stop: tokio::sync::oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = &mut stop => {
                    debug!("watcher received stop signal");
                    return;
                }

                event = self.raw_rx.recv() => {
                    match event {
                        Some(Ok(raw)) => {
                            for change in classify(&raw, &self.project_root) {
                                self.forward(&audit, &boundary, change).await;
                            }
                        }
                        Some(Err(e)) => warn!(error = %e, "filesystem watcher error"),
                        None => {
                            debug!("filesystem watcher channel closed, stopping");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn forward(&self, audit: &AuditLogger, boundary: &BoundaryEnforcer, change: FileChangeEvent) {
        if let Err(e) = audit
            .log_file_change(change.event_type, &change.path, change.old_path.as_deref())
            .await
        {
            warn!(error = %e, path = %change.path, "failed to log watcher file change");
        }

        let check = boundary.check_path_allowed(&change.path, WATCHER_AGENT_NAME);
        if !check.allowed {
            let details = serde_json::json!({
                "reason": check.reason,
                "event_type": change.event_type.as_str(),
            });
            if let Err(e) = boundary
                .record_violation(
                    None,
                    change.path.clone(),
                    ViolationType::ForbiddenPath,
                    EnforcementAction::Logged,
                    details,
                )
                .await
            {
                warn!(error = %e, path = %change.path, "failed to record watcher boundary violation");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use k6s_config::{BoundaryEntry, EnforcementMode};
    use k6s_core::SessionId;
    use k6s_storage::Store;

    use super::*;

    async fn seeded(root: PathBuf) -> (AuditLogger, BoundaryEnforcer) {
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

        let audit = AuditLogger::start(store.clone(), session_id.clone())
            .await
            .unwrap();
        let boundary = BoundaryEnforcer::new(
            store,
            session_id,
            root,
            vec![k6s_boundary::BoundaryConfig::from(BoundaryEntry {
                pattern: "*".to_string(),
                allowed_paths: Vec::new(),
                forbidden_paths: vec![".env*".to_string()],
                enforcement: EnforcementMode::Advisory,
                max_tokens_per_hour: None,
                max_cost_per_hour: None,
            })],
        );
        (audit, boundary)
    }

    #[tokio::test]
    async fn forward_logs_audit_event_and_records_violation_for_forbidden_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let (audit, boundary) = seeded(root.clone()).await;

        let watcher = FileWatcher {
            project_root: root,
            _watcher: RecommendedWatcher::new(|_: notify::Result<Event>| {}, notify::Config::default())
                .unwrap(),
            raw_rx: mpsc::channel(1).1,
        };

        watcher
            .forward(
                &audit,
                &boundary,
                FileChangeEvent {
                    event_type: k6s_core::EventType::FileModify,
                    path: ".env".to_string(),
                    is_directory: false,
                    old_path: None,
                },
            )
            .await;

        assert_eq!(audit.get_event_count().await.unwrap(), 1);
        let violations = boundary.get_violations(None, 10).await.unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].file_path, ".env");
        assert!(violations[0].agent_id.is_none());
    }

    #[tokio::test]
    async fn forward_logs_audit_event_without_violation_for_allowed_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let (audit, boundary) = seeded(root.clone()).await;

        let watcher = FileWatcher {
            project_root: root,
            _watcher: RecommendedWatcher::new(|_: notify::Result<Event>| {}, notify::Config::default())
                .unwrap(),
            raw_rx: mpsc::channel(1).1,
        };

        watcher
            .forward(
                &audit,
                &boundary,
                FileChangeEvent {
                    event_type: k6s_core::EventType::FileCreate,
                    path: "src/main.rs".to_string(),
                    is_directory: false,
                    old_path: None,
                },
            )
            .await;

        assert_eq!(audit.get_event_count().await.unwrap(), 1);
        assert!(boundary.get_violations(None, 10).await.unwrap().is_empty());
    }
}
