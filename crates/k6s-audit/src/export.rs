//! Audit export formats: a JSON array and a flat CSV.

use k6s_core::{AgentId, AuditEvent};

use crate::error::Result;
use crate::logger::AuditLogger;

impl AuditLogger {
    /// Export the full event set for this session as a JSON array,
    /// most-recent-sequence-first (the same order [`AuditLogger::get_events`]
    /// returns).
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuditError::Store`] on a storage failure.
    pub async fn export_json(&self) -> Result<String> {
        let events = self.all_events().await?;
        Ok(serde_json::to_string_pretty(&events).unwrap_or_else(|_| "[]".to_string()))
    }

    /// Export the full event set for this session as CSV with header
    /// `timestamp,sequence,session_id,agent_id,event_type,action,files_affected`
    /// (files joined with `;`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuditError::Store`] on a storage failure.
    pub async fn export_csv(&self) -> Result<String> {
        let events = self.all_events().await?;
        let mut out = String::from(
            "timestamp,sequence,session_id,agent_id,event_type,action,files_affected\n",
        );
        for event in &events {
            out.push_str(&csv_row(event));
            out.push('\n');
        }
        Ok(out)
    }

    async fn all_events(&self) -> Result<Vec<AuditEvent>> {
        let total = self.get_event_count().await?;
        self.get_events(u32::try_from(total).unwrap_or(u32::MAX), 0, None, None, None)
            .await
    }
}

fn csv_row(event: &AuditEvent) -> String {
    let agent_id = event.agent_id.as_ref().map(AgentId::as_str).unwrap_or("");
    let files = event.files_affected.join(";");
    format!(
        "{},{},{},{},{},{},{}",
        csv_escape(&event.timestamp),
        event.sequence,
        csv_escape(event.session_id.as_str()),
        csv_escape(agent_id),
        csv_escape(event.event_type.as_str()),
        csv_escape(&event.action),
        csv_escape(&files),
    )
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use k6s_core::{EventType, SessionId};
    use k6s_storage::Store;

    use super::*;

    #[tokio::test]
    async fn export_json_round_trips() {
        let store = Store::open_memory().await.unwrap();
        let session_id = SessionId::new();
        let conn_session_id = session_id.as_str().to_string();
        store
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (id, objective, state, started_at) VALUES (?1,'x','created','t')",
                    k6s_storage::rusqlite::params![conn_session_id],
                )
            })
            .await
            .unwrap();
        let logger = AuditLogger::start(store, session_id).await.unwrap();
        logger
            .log(EventType::Log, "a", None, None, None, None)
            .await
            .unwrap();
        logger
            .log(EventType::Log, "b", None, None, None, None)
            .await
            .unwrap();
        logger.stop().await.unwrap();

        let json = logger.export_json().await.unwrap();
        let parsed: Vec<AuditEvent> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 2);

        let csv = logger.export_csv().await.unwrap();
        assert!(csv.starts_with("timestamp,sequence,session_id,agent_id,event_type,action,files_affected\n"));
        assert_eq!(csv.lines().count(), 3);
    }
}
