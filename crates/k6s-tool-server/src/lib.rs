//! Line-delimited JSON tool-call server for the k6s governance engine.
//!
//! Wraps [`StateManager`](k6s_state::StateManager),
//! [`AuditLogger`](k6s_audit::AuditLogger),
//! [`BoundaryEnforcer`](k6s_boundary::BoundaryEnforcer), and
//! [`LockManager`](k6s_lock::LockManager) behind a fixed tool set and
//! three read-only `k6s://` resources, framed as one JSON object per
//! line over any `AsyncRead`/`AsyncWrite` pair (stdio in production).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod protocol;
mod resources;
mod server;

pub use error::{Result, ToolServerError};
pub use protocol::{ContentItem, ToolRequest, ToolResponse};
pub use server::ToolServer;

#[cfg(test)]
mod tests {
    use super::*;
    use k6s_audit::AuditLogger;
    use k6s_boundary::BoundaryEnforcer;
    use k6s_config::K6sConfig;
    use k6s_events::EventBus;
    use k6s_lock::LockManager;
    use k6s_state::StateManager;
    use k6s_storage::Store;
    use std::path::PathBuf;
    use std::sync::Arc;

    async fn harness() -> (ToolServer, Store) {
        let store = Store::open_memory().await.expect("open memory store");
        let state = StateManager::new(store.clone());
        let session = state
            .create_session("test objective", None, None)
            .await
            .expect("create session");
        let audit = AuditLogger::start(store.clone(), session.id.clone())
            .await
            .expect("start audit logger");
        let config = K6sConfig::default_config("test-project");
        let configs = config.boundaries.into_iter().map(Into::into).collect();
        let boundary = BoundaryEnforcer::new(store.clone(), session.id.clone(), PathBuf::from("/proj"), configs);
        let lock = LockManager::new(store.clone(), session.id.clone());
        let bus = Arc::new(EventBus::new());

        (
            ToolServer::new(state, audit, boundary, lock, bus, session.id.clone()),
            store,
        )
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_response_not_panic() {
        let (server, _store) = harness().await;
        let response = server
            .handle_line(r#"{"id":"1","tool":"nonexistent","input":{}}"#)
            .await;
        assert!(response.contains("\"error\""));
        assert!(response.contains("\"id\":\"1\""));
    }

    #[tokio::test]
    async fn malformed_line_becomes_error_response_without_id() {
        let (server, _store) = harness().await;
        let response = server.handle_line("not json at all").await;
        assert!(response.contains("\"error\""));
        assert!(!response.contains("\"id\""));
    }

    #[tokio::test]
    async fn log_then_load_context_round_trip() {
        let (server, _store) = harness().await;

        let save = server
            .handle_line(r#"{"id":"1","tool":"save_context","input":{"key":"plan","value":{"step":1},"agent_name":"alice"}}"#)
            .await;
        assert!(save.contains("\"saved\""));

        let load = server
            .handle_line(r#"{"id":"2","tool":"load_context","input":{"key":"plan"}}"#)
            .await;
        assert!(load.contains("\"found\""));
        assert!(load.contains("\"step\""));
    }

    #[tokio::test]
    async fn acquire_lock_auto_registers_unknown_agent() {
        let (server, _store) = harness().await;
        let response = server
            .handle_line(r#"{"id":"1","tool":"acquire_lock","input":{"path":"src/main.rs","agent_name":"brand-new-agent"}}"#)
            .await;
        assert!(response.contains("\"success\":true"));
    }

    #[tokio::test]
    async fn mutual_exclusion_over_the_wire() {
        let (server, _store) = harness().await;
        let first = server
            .handle_line(r#"{"id":"1","tool":"acquire_lock","input":{"path":"src/main.rs","agent_name":"alice"}}"#)
            .await;
        assert!(first.contains("\"success\":true"));

        let second = server
            .handle_line(r#"{"id":"2","tool":"acquire_lock","input":{"path":"src/main.rs","agent_name":"bob"}}"#)
            .await;
        assert!(second.contains("\"success\":false"));
    }

    #[tokio::test]
    async fn resource_session_current() {
        let (server, _store) = harness().await;
        let response = server
            .handle_line(r#"{"id":"1","tool":"resource","input":{"uri":"k6s://session/current"}}"#)
            .await;
        assert!(response.contains("\"session\""));
        assert!(response.contains("\"agents\""));
    }

    #[tokio::test]
    async fn resource_unknown_uri_is_error() {
        let (server, _store) = harness().await;
        let response = server
            .handle_line(r#"{"id":"1","tool":"resource","input":{"uri":"k6s://nope"}}"#)
            .await;
        assert!(response.contains("\"error\""));
    }
}
