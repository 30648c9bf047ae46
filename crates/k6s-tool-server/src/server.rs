//! The tool set and the handler that dispatches a parsed request to it.

use std::sync::Arc;

use k6s_audit::AuditLogger;
use k6s_boundary::BoundaryEnforcer;
use k6s_core::{AgentId, AgentRole, AuditEvent, EventType, SessionId};
use k6s_events::EventBus;
use k6s_lock::LockManager;
use k6s_state::StateManager;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::warn;

use crate::error::Result;
use crate::protocol::ToolResponse;

/// Composes the components a tool call needs: session state, the audit
/// log, boundary enforcement, file locking, and the event bus every
/// logged event fans out onto.
///
/// One instance is bound to one active session.
#[derive(Clone)]
pub struct ToolServer {
    state: StateManager,
    audit: AuditLogger,
    boundary: BoundaryEnforcer,
    lock: LockManager,
    bus: Arc<EventBus>,
    session_id: SessionId,
}

impl ToolServer {
    /// Build a server bound to the given session and components.
    #[must_use]
    pub fn new(
        state: StateManager,
        audit: AuditLogger,
        boundary: BoundaryEnforcer,
        lock: LockManager,
        bus: Arc<EventBus>,
        session_id: SessionId,
    ) -> Self {
        Self {
            state,
            audit,
            boundary,
            lock,
            bus,
            session_id,
        }
    }

    /// Log through the audit logger and fan the resulting event out
    /// onto the bus for any subscribed sink.
    async fn log(
        &self,
        event_type: EventType,
        action: impl Into<String>,
        agent_id: Option<AgentId>,
        details: Option<serde_json::Value>,
        files_affected: Option<Vec<String>>,
    ) -> std::result::Result<AuditEvent, k6s_audit::AuditError> {
        let event = self
            .audit
            .log(event_type, action, agent_id, details, files_affected, None)
            .await?;
        self.bus.publish(event.clone());
        Ok(event)
    }

    /// Parse, dispatch, and format one request line into a response
    /// line.
    ///
    /// Never fails: a malformed line, an unknown tool, or a handler
    /// error all become a JSON `{"error": ...}` text response, per the
    /// server's "never crashes on a bad request" contract.
    pub async fn handle_line(&self, line: &str) -> String {
        let request: crate::protocol::ToolRequest = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, "malformed tool request line");
                return serde_json::to_string(&ToolResponse::error(None, e.to_string()))
                    .unwrap_or_else(|_| "{\"content\":[]}".to_string());
            }
        };

        let response = match self.dispatch(&request.tool, request.input).await {
            Ok(value) => ToolResponse::ok(Some(request.id), value),
            Err(message) => ToolResponse::error(Some(request.id), message),
        };

        serde_json::to_string(&response).unwrap_or_else(|_| "{\"content\":[]}".to_string())
    }

    /// Run the line-delimited request/response loop until `reader`
    /// reaches EOF.
    ///
    /// Each line is handled independently; a handler error never
    /// terminates the loop, only a transport-level read/write failure
    /// does (surfaced as a [`ToolServerError`](crate::ToolServerError)).
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: tokio::io::AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let response = self.handle_line(&line).await;
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok(())
    }

    async fn dispatch(&self, tool: &str, input: serde_json::Value) -> Result<serde_json::Value, String> {
        match tool {
            "log" => self.tool_log(input).await,
            "save_context" => self.tool_save_context(input).await,
            "load_context" => self.tool_load_context(input).await,
            "acquire_lock" => self.tool_acquire_lock(input).await,
            "release_lock" => self.tool_release_lock(input).await,
            "get_boundaries" => self.tool_get_boundaries(input).await,
            "check_path" => self.tool_check_path(input).await,
            "task_update" => self.tool_task_update(input).await,
            "resource" => self.tool_resource(input).await,
            other => Err(format!("unknown tool: {other}")),
        }
    }

    /// Dispatches `k6s://` resource reads through the same request/
    /// response wire shape as every other tool, under the reserved
    /// tool name `resource` with input `{"uri": "k6s://..."}`.
    async fn tool_resource(&self, input: serde_json::Value) -> Result<serde_json::Value, String> {
        let uri = input
            .get("uri")
            .and_then(|v| v.as_str())
            .ok_or("missing required field: uri")?;

        crate::resources::read_resource(uri, &self.state, &self.audit, &self.boundary, &self.session_id)
            .await
            .unwrap_or_else(|| Err(format!("unknown resource: {uri}")))
    }

    /// Resolve `agent_name` to an [`AgentId`], auto-registering a
    /// `teammate` agent in the active session if none exists yet.
    async fn ensure_agent(&self, agent_name: &str) -> Result<AgentId, String> {
        if let Some(agent) = self
            .state
            .get_agent_by_name(&self.session_id, agent_name)
            .await
            .map_err(|e| e.to_string())?
        {
            return Ok(agent.id);
        }
        let agent = self
            .state
            .create_agent(&self.session_id, agent_name, AgentRole::Teammate, None, None)
            .await
            .map_err(|e| e.to_string())?;
        Ok(agent.id)
    }

    async fn tool_log(&self, input: serde_json::Value) -> Result<serde_json::Value, String> {
        let action = input
            .get("action")
            .and_then(|v| v.as_str())
            .ok_or("missing required field: action")?
            .to_string();
        let event_type = input
            .get("event_type")
            .and_then(|v| v.as_str())
            .map(EventType::parse_or_log)
            .unwrap_or(EventType::Log);
        let agent_id = match input.get("agent_name").and_then(|v| v.as_str()) {
            Some(name) => Some(self.ensure_agent(name).await?),
            None => None,
        };
        let details = input.get("details").cloned();
        let files = input
            .get("files")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect());

        let event = self
            .log(event_type, action, agent_id, details, files)
            .await
            .map_err(|e| e.to_string())?;

        Ok(serde_json::json!({
            "status": "logged",
            "event_id": event.id.as_str(),
            "sequence": event.sequence,
        }))
    }

    async fn tool_save_context(&self, input: serde_json::Value) -> Result<serde_json::Value, String> {
        let key = input
            .get("key")
            .and_then(|v| v.as_str())
            .ok_or("missing required field: key")?
            .to_string();
        let value = input.get("value").cloned().unwrap_or(serde_json::Value::Null);
        let agent_id = match input.get("agent_name").and_then(|v| v.as_str()) {
            Some(name) => Some(self.ensure_agent(name).await?),
            None => None,
        };

        let entry = self
            .state
            .save_context(&self.session_id, key.clone(), agent_id.clone(), value)
            .await
            .map_err(|e| e.to_string())?;

        if let Err(e) = self
            .log(
                EventType::ContextSaved,
                "context_saved",
                agent_id,
                Some(serde_json::json!({ "key": key })),
                None,
            )
            .await
        {
            warn!(error = %e, "failed to log context_saved audit event");
        }

        Ok(serde_json::json!({
            "status": "saved",
            "key": entry.key,
            "updated_at": entry.updated_at,
        }))
    }

    async fn tool_load_context(&self, input: serde_json::Value) -> Result<serde_json::Value, String> {
        let key = input
            .get("key")
            .and_then(|v| v.as_str())
            .ok_or("missing required field: key")?;

        match self
            .state
            .load_context(&self.session_id, key)
            .await
            .map_err(|e| e.to_string())?
        {
            Some(entry) => Ok(serde_json::json!({
                "status": "found",
                "key": entry.key,
                "value": entry.value,
                "updated_at": entry.updated_at,
            })),
            None => Ok(serde_json::json!({ "status": "not_found", "key": key })),
        }
    }

    async fn tool_acquire_lock(&self, input: serde_json::Value) -> Result<serde_json::Value, String> {
        let path = input
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or("missing required field: path")?
            .to_string();
        let agent_name = input
            .get("agent_name")
            .and_then(|v| v.as_str())
            .ok_or("missing required field: agent_name")?;
        let duration = input
            .get("duration_seconds")
            .and_then(serde_json::Value::as_u64)
            .map(std::time::Duration::from_secs);

        let agent_id = self.ensure_agent(agent_name).await?;
        let result = self
            .lock
            .acquire(&path, &agent_id, duration)
            .await
            .map_err(|e| e.to_string())?;

        let (event_type, action) = if result.success {
            (EventType::LockAcquired, "lock_acquired")
        } else {
            (EventType::LockDenied, "lock_denied")
        };
        if let Err(e) = self
            .log(
                event_type,
                action,
                Some(agent_id),
                Some(serde_json::json!({ "path": path, "reason": result.reason })),
                Some(vec![path.clone()]),
            )
            .await
        {
            warn!(error = %e, "failed to log lock audit event");
        }

        serde_json::to_value(&result).map_err(|e| e.to_string())
    }

    async fn tool_release_lock(&self, input: serde_json::Value) -> Result<serde_json::Value, String> {
        let path = input
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or("missing required field: path")?
            .to_string();
        let agent_name = input
            .get("agent_name")
            .and_then(|v| v.as_str())
            .ok_or("missing required field: agent_name")?;

        let agent_id = self.ensure_agent(agent_name).await?;
        let result = self
            .lock
            .release(&path, &agent_id)
            .await
            .map_err(|e| e.to_string())?;

        if result.success {
            if let Err(e) = self
                .log(
                    EventType::LockReleased,
                    "lock_released",
                    Some(agent_id),
                    Some(serde_json::json!({ "path": path })),
                    Some(vec![path.clone()]),
                )
                .await
            {
                warn!(error = %e, "failed to log lock_released audit event");
            }
        }

        serde_json::to_value(&result).map_err(|e| e.to_string())
    }

    async fn tool_get_boundaries(&self, input: serde_json::Value) -> Result<serde_json::Value, String> {
        let agent_name = input
            .get("agent_name")
            .and_then(|v| v.as_str())
            .ok_or("missing required field: agent_name")?;
        self.ensure_agent(agent_name).await?;
        let summary = self.boundary.agent_boundaries_summary(agent_name);
        serde_json::to_value(&summary).map_err(|e| e.to_string())
    }

    async fn tool_check_path(&self, input: serde_json::Value) -> Result<serde_json::Value, String> {
        let path = input
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or("missing required field: path")?
            .to_string();
        let agent_name = input
            .get("agent_name")
            .and_then(|v| v.as_str())
            .ok_or("missing required field: agent_name")?;

        let agent_id = self.ensure_agent(agent_name).await?;
        let check = self.boundary.check_path_allowed(&path, agent_name);

        if let Err(e) = self
            .log(
                EventType::BoundaryCheck,
                "boundary_check",
                Some(agent_id),
                Some(serde_json::json!({
                    "path": path,
                    "allowed": check.allowed,
                    "reason": check.reason,
                })),
                Some(vec![path.clone()]),
            )
            .await
        {
            warn!(error = %e, "failed to log boundary_check audit event");
        }

        Ok(serde_json::json!({
            "path": path,
            "agent": agent_name,
            "allowed": check.allowed,
            "reason": check.reason,
        }))
    }

    async fn tool_task_update(&self, input: serde_json::Value) -> Result<serde_json::Value, String> {
        let task_id = input
            .get("task_id")
            .and_then(|v| v.as_str())
            .ok_or("missing required field: task_id")?
            .to_string();
        let status = input
            .get("status")
            .and_then(|v| v.as_str())
            .ok_or("missing required field: status")?
            .to_string();
        let progress = input.get("progress").cloned();
        let agent_id = match input.get("agent_name").and_then(|v| v.as_str()) {
            Some(name) => Some(self.ensure_agent(name).await?),
            None => None,
        };

        let event = self
            .log(
                EventType::TaskUpdate,
                "task_update",
                agent_id,
                Some(serde_json::json!({
                    "task_id": task_id,
                    "status": status,
                    "progress": progress,
                })),
                None,
            )
            .await
            .map_err(|e| e.to_string())?;

        Ok(serde_json::json!({
            "status": "logged",
            "event_id": event.id.as_str(),
        }))
    }
}
