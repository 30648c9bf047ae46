//! Row <-> [`AuditEvent`] conversion.

use k6s_core::{AgentId, AuditEvent, AuditEventId, EventType, SessionId};
use k6s_storage::rusqlite::{Error as SqlError, Row};

pub(crate) const AUDIT_COLUMNS: &str = "id, session_id, agent_id, sequence, timestamp, \
     event_type, action, details, files_affected, gate_id, hmac";

pub(crate) fn audit_event_from_row(row: &Row) -> Result<AuditEvent, SqlError> {
    let event_type: String = row.get(5)?;
    let details: String = row.get(7)?;
    let files_affected: String = row.get(8)?;
    Ok(AuditEvent {
        id: AuditEventId::from(row.get::<_, String>(0)?),
        session_id: SessionId::from(row.get::<_, String>(1)?),
        agent_id: row.get::<_, Option<String>>(2)?.map(AgentId::from),
        sequence: u64::try_from(row.get::<_, i64>(3)?).unwrap_or(0),
        timestamp: row.get(4)?,
        event_type: EventType::parse_or_log(&event_type),
        action: row.get(6)?,
        details: serde_json::from_str(&details).unwrap_or(serde_json::Value::Null),
        files_affected: serde_json::from_str(&files_affected).unwrap_or_default(),
        gate_id: row.get(9)?,
        hmac: row.get(10)?,
    })
}
