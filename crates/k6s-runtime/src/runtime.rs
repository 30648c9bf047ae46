//! Composes the governance engine's components into one running daemon.
//!
//! Startup order is leaves-first: Store, then the components built on
//! it (`StateManager`, `AuditLogger`, `BoundaryEnforcer`, `LockManager`),
//! then the `FileWatcher` and `ToolServer` that sit on top. Shutdown
//! runs the reverse: stop intake, release locks, flush the audit log,
//! drain the event bus, remove the liveness marker.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use k6s_audit::AuditLogger;
use k6s_boundary::{BoundaryConfig, BoundaryEnforcer};
use k6s_config::K6sConfig;
use k6s_core::{EventType, SessionId};
use k6s_events::EventBus;
use k6s_lock::LockManager;
use k6s_state::{Session, StateManager};
use k6s_storage::Store;
use k6s_tool_server::ToolServer;
use k6s_watcher::FileWatcher;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{Result, RuntimeError};
use crate::liveness::{self, LivenessMarker};

/// Name of the engine's state directory under the project root.
pub const ENGINE_DIR_NAME: &str = ".khoregos";
/// Filename of the embedded database within the engine directory.
pub const DB_FILE_NAME: &str = "k6s.db";

struct Watcher {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// The running governance engine for one session.
///
/// Owns every component over the shared [`Store`] and is the sole
/// place that sequences startup and shutdown: components are constructed
/// here and handed out, never reached via a process-wide static.
pub struct Runtime {
    store: Store,
    state: StateManager,
    audit: AuditLogger,
    boundary: BoundaryEnforcer,
    lock: LockManager,
    bus: Arc<EventBus>,
    tool_server: ToolServer,
    session_id: SessionId,
    project_root: PathBuf,
    engine_dir: PathBuf,
    watcher: Mutex<Option<Watcher>>,
}

impl Runtime {
    /// Start a fresh session governing `project_root`.
    ///
    /// Refuses if a liveness marker is already present — only one
    /// session may be active per project at a time.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::SessionAlreadyActive`] if a session is
    /// already running, or any component's startup error otherwise.
    pub async fn start(
        project_root: PathBuf,
        config: K6sConfig,
        objective: impl Into<String>,
    ) -> Result<Self> {
        Self::start_inner(project_root, config, objective, None).await
    }

    /// Start a new session that resumes from `parent`, carrying its
    /// [`generate_resume_context`](k6s_state::StateManager::generate_resume_context)
    /// summary forward as the new session's `context_summary`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::SessionAlreadyActive`] if a session is
    /// already running, [`RuntimeError::NoActiveSession`] if `parent`
    /// doesn't exist, or any component's startup error otherwise.
    pub async fn resume(
        project_root: PathBuf,
        config: K6sConfig,
        objective: impl Into<String>,
        parent: SessionId,
    ) -> Result<Self> {
        Self::start_inner(project_root, config, objective, Some(parent)).await
    }

    async fn start_inner(
        project_root: PathBuf,
        config: K6sConfig,
        objective: impl Into<String>,
        parent: Option<SessionId>,
    ) -> Result<Self> {
        let engine_dir = project_root.join(ENGINE_DIR_NAME);
        prepare_engine_dir(&engine_dir)?;

        if liveness::read_marker(&engine_dir)?.is_some() {
            return Err(RuntimeError::SessionAlreadyActive(liveness::marker_path(
                &engine_dir,
            )));
        }

        let store = Store::open(engine_dir.join(DB_FILE_NAME)).await?;
        let state = StateManager::new(store.clone());

        let mut resume_summary = None;
        if let Some(parent_id) = &parent {
            let Some(parent_session) = state.get_session(parent_id).await? else {
                return Err(RuntimeError::NoActiveSession(format!(
                    "parent session {parent_id} not found"
                )));
            };
            resume_summary = Some(state.generate_resume_context(&parent_session).await?);
        }

        let config_snapshot = serde_json::to_value(&config).ok();
        let session = state
            .create_session(objective, config_snapshot, parent)
            .await?;
        if let Some(summary) = &resume_summary {
            state.set_context_summary(&session.id, summary.clone()).await?;
        }
        state.mark_session_active(&session.id).await?;

        let bus = Arc::new(EventBus::new());
        bus.start().await;

        let audit = AuditLogger::start(store.clone(), session.id.clone()).await?;
        let start_event = audit
            .log_session_event(EventType::SessionStart, "session started")
            .await?;
        bus.publish(start_event);

        let boundary_configs: Vec<BoundaryConfig> = config
            .boundaries
            .into_iter()
            .map(BoundaryConfig::from)
            .collect();
        let boundary = BoundaryEnforcer::new(
            store.clone(),
            session.id.clone(),
            project_root.clone(),
            boundary_configs,
        );
        let lock = LockManager::new(store.clone(), session.id.clone());

        let watcher = start_watcher(project_root.clone(), audit.clone(), boundary.clone())?;

        let tool_server = ToolServer::new(
            state.clone(),
            audit.clone(),
            boundary.clone(),
            lock.clone(),
            Arc::clone(&bus),
            session.id.clone(),
        );

        liveness::write_marker(
            &engine_dir,
            &LivenessMarker {
                session_id: session.id.clone(),
                started_at: session.started_at.clone(),
                project_root: project_root.clone(),
            },
        )?;

        info!(session = %session.id, project = %project_root.display(), "session active");

        Ok(Self {
            store,
            state,
            audit,
            boundary,
            lock,
            bus,
            tool_server,
            session_id: session.id,
            project_root,
            engine_dir,
            watcher: Mutex::new(Some(watcher)),
        })
    }

    /// The active session's id.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Project root this runtime governs.
    #[must_use]
    pub fn project_root(&self) -> &std::path::Path {
        &self.project_root
    }

    /// The shared embedded store. Exposed for operator-surface
    /// callers (e.g. `show`/`tail`/`export`) that read state this
    /// runtime does not itself need a handle on.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Session/agent/context CRUD.
    #[must_use]
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// The session's audit log.
    #[must_use]
    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// The session's boundary enforcer.
    #[must_use]
    pub fn boundary(&self) -> &BoundaryEnforcer {
        &self.boundary
    }

    /// The session's file lock manager.
    #[must_use]
    pub fn lock(&self) -> &LockManager {
        &self.lock
    }

    /// The tool-call server bound to this session.
    #[must_use]
    pub fn tool_server(&self) -> &ToolServer {
        &self.tool_server
    }

    /// Serve the tool-call protocol over `reader`/`writer` (stdio in
    /// production) until the stream closes.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ToolServer`] on a transport failure.
    pub async fn serve_tool_calls<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: tokio::io::AsyncRead + Unpin,
        W: tokio::io::AsyncWrite + Unpin,
    {
        self.tool_server.run(reader, writer).await?;
        Ok(())
    }

    /// Pause the session. Valid only from `active`.
    ///
    /// # Errors
    ///
    /// Returns a state-manager error if the transition is invalid.
    pub async fn pause(&self) -> Result<Session> {
        let session = self.state.mark_session_paused(&self.session_id).await?;
        let event = self
            .audit
            .log_session_event(EventType::SessionPause, "session paused")
            .await?;
        self.bus.publish(event);
        Ok(session)
    }

    /// Resume a paused session back to `active`.
    ///
    /// # Errors
    ///
    /// Returns a state-manager error if the transition is invalid.
    pub async fn unpause(&self) -> Result<Session> {
        let session = self.state.mark_session_active(&self.session_id).await?;
        let event = self
            .audit
            .log_session_event(EventType::SessionResume, "session resumed")
            .await?;
        self.bus.publish(event);
        Ok(session)
    }

    /// Wait for `SIGINT`/`SIGTERM` (or `Ctrl+C` on platforms without
    /// the former).
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Io`] if the signal handler can't be
    /// installed.
    pub async fn wait_for_shutdown_signal(&self) -> Result<()> {
        #[cfg(unix)]
        {
            let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
        }
        Ok(())
    }

    /// Graceful shutdown: log `session_complete`, stop the watcher,
    /// release every lock this session holds, mark the session
    /// completed, flush and stop the audit logger, drain and stop the
    /// event bus, and remove the liveness marker.
    ///
    /// Idempotent with respect to the liveness marker: a second call
    /// (e.g. signal then explicit stop) is a no-op on the marker side.
    ///
    /// # Errors
    ///
    /// Returns the first component error encountered; later shutdown
    /// steps still run on a best-effort basis so resources aren't
    /// leaked by an early return.
    pub async fn stop(&self) -> Result<()> {
        self.stop_with(EventType::SessionComplete, "session completed")
            .await
    }

    /// As [`Runtime::stop`], but marks the session `failed` and logs
    /// `session_fail` instead.
    ///
    /// # Errors
    ///
    /// See [`Runtime::stop`].
    pub async fn fail(&self, reason: impl Into<String>) -> Result<()> {
        self.stop_with(EventType::SessionFail, reason).await
    }

    async fn stop_with(&self, event_type: EventType, detail: impl Into<String>) -> Result<()> {
        let mut first_error = None;

        match self.audit.log_session_event(event_type, detail).await {
            Ok(event) => self.bus.publish(event),
            Err(e) => {
                warn!(error = %e, "failed to log session shutdown event");
                first_error.get_or_insert(RuntimeError::from(e));
            }
        }

        if let Some(watcher) = self.watcher.lock().await.take() {
            let _ = watcher.stop.send(());
            let _ = watcher.handle.await;
        }

        if let Err(e) = self.lock.release_all().await {
            warn!(error = %e, "failed to release locks on shutdown");
            first_error.get_or_insert(RuntimeError::from(e));
        }

        let mark_result = match event_type {
            EventType::SessionFail => self.state.mark_session_failed(&self.session_id).await,
            _ => self.state.mark_session_completed(&self.session_id).await,
        };
        if let Err(e) = mark_result {
            warn!(error = %e, "failed to finalize session state on shutdown");
            first_error.get_or_insert(RuntimeError::from(e));
        }

        if let Err(e) = self.audit.stop().await {
            warn!(error = %e, "final audit flush failed");
            first_error.get_or_insert(RuntimeError::from(e));
        }

        self.bus.stop().await;

        if let Err(e) = liveness::remove_marker(&self.engine_dir) {
            warn!(error = %e, "failed to remove liveness marker");
            first_error.get_or_insert(e);
        }

        info!(session = %self.session_id, "session shut down");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn start_watcher(
    project_root: PathBuf,
    audit: AuditLogger,
    boundary: BoundaryEnforcer,
) -> Result<Watcher> {
    let watcher = FileWatcher::start(project_root)?;
    let (stop_tx, stop_rx) = oneshot::channel();
    let handle = tokio::spawn(watcher.run(audit, boundary, stop_rx));
    Ok(Watcher {
        stop: stop_tx,
        handle,
    })
}

fn prepare_engine_dir(dir: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Busy-timeout ceiling lock acquisitions inherit from the Store.
/// Exposed so callers building their own retry/backoff around a
/// contended `acquire_lock` tool call know what the server already
/// waits out internally.
pub const LOCK_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(name: &str) -> K6sConfig {
        K6sConfig::default_config(name)
    }

    #[tokio::test]
    async fn start_creates_liveness_marker_and_active_session() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let runtime = Runtime::start(root.clone(), test_config("demo"), "build auth")
            .await
            .unwrap();

        let marker_path = root.join(ENGINE_DIR_NAME).join("daemon.state");
        assert!(marker_path.exists());

        let session = runtime
            .state()
            .get_session(runtime.session_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.state, k6s_core::SessionState::Active);

        runtime.stop().await.unwrap();
        assert!(!marker_path.exists());
    }

    #[tokio::test]
    async fn starting_twice_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let first = Runtime::start(root.clone(), test_config("demo"), "x").await.unwrap();

        let second = Runtime::start(root.clone(), test_config("demo"), "y").await;
        assert!(matches!(second, Err(RuntimeError::SessionAlreadyActive(_))));

        first.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_marks_session_completed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let runtime = Runtime::start(root, test_config("demo"), "x").await.unwrap();
        let session_id = runtime.session_id().clone();
        let state = runtime.state().clone();
        runtime.stop().await.unwrap();

        let session = state.get_session(&session_id).await.unwrap().unwrap();
        assert_eq!(session.state, k6s_core::SessionState::Completed);
        assert!(session.ended_at.is_some());
    }

    #[tokio::test]
    async fn resume_carries_context_summary_forward() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let first = Runtime::start(root.clone(), test_config("demo"), "phase one")
            .await
            .unwrap();
        first
            .state()
            .save_context(first.session_id(), "progress", None, serde_json::json!("halfway"))
            .await
            .unwrap();
        let parent_id = first.session_id().clone();
        first.stop().await.unwrap();

        let second = Runtime::resume(root, test_config("demo"), "phase two", parent_id.clone())
            .await
            .unwrap();
        let session = second
            .state()
            .get_session(second.session_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.parent_session_id, Some(parent_id));
        let summary = session.context_summary.unwrap();
        assert!(summary.contains("phase one"));
        assert!(summary.contains("progress"));

        second.stop().await.unwrap();
    }

    #[tokio::test]
    async fn pause_and_unpause_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let runtime = Runtime::start(root, test_config("demo"), "x").await.unwrap();

        let paused = runtime.pause().await.unwrap();
        assert_eq!(paused.state, k6s_core::SessionState::Paused);
        let active = runtime.unpause().await.unwrap();
        assert_eq!(active.state, k6s_core::SessionState::Active);

        runtime.stop().await.unwrap();
    }
}
