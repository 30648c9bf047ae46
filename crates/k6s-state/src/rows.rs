//! Row <-> type mapping.

use std::str::FromStr;

use k6s_core::{AgentId, AgentRole, AgentState, SessionId, SessionState};
use k6s_storage::rusqlite::{Error as SqlError, Row};

use crate::types::{Agent, ContextEntry, Session};

fn json_column(row: &Row, idx: usize) -> Result<serde_json::Value, SqlError> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| SqlError::FromSqlConversionFailure(idx, rusqlite_type(), Box::new(e)))
}

fn rusqlite_type() -> k6s_storage::rusqlite::types::Type {
    k6s_storage::rusqlite::types::Type::Text
}

pub fn session_from_row(row: &Row) -> Result<Session, SqlError> {
    let id: String = row.get(0)?;
    let objective: String = row.get(1)?;
    let state_raw: String = row.get(2)?;
    let started_at: String = row.get(3)?;
    let ended_at: Option<String> = row.get(4)?;
    let parent_session_id: Option<String> = row.get(5)?;
    let config_snapshot: Option<String> = row.get(6)?;
    let context_summary: Option<String> = row.get(7)?;
    let total_cost_usd: f64 = row.get(8)?;
    let total_input_tokens: i64 = row.get(9)?;
    let total_output_tokens: i64 = row.get(10)?;
    let metadata = json_column(row, 11)?;

    let state = SessionState::from_str(&state_raw)
        .map_err(|e| SqlError::FromSqlConversionFailure(2, rusqlite_type(), Box::new(e)))?;

    Ok(Session {
        id: SessionId::from(id),
        objective,
        state,
        started_at,
        ended_at,
        parent_session_id: parent_session_id.map(SessionId::from),
        config_snapshot: config_snapshot
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| SqlError::FromSqlConversionFailure(6, rusqlite_type(), Box::new(e)))?,
        context_summary,
        total_cost_usd,
        total_input_tokens,
        total_output_tokens,
        metadata,
    })
}

pub fn agent_from_row(row: &Row) -> Result<Agent, SqlError> {
    let id: String = row.get(0)?;
    let session_id: String = row.get(1)?;
    let name: String = row.get(2)?;
    let role_raw: String = row.get(3)?;
    let specialization: Option<String> = row.get(4)?;
    let state_raw: String = row.get(5)?;
    let spawned_at: String = row.get(6)?;
    let boundary_config: Option<String> = row.get(7)?;
    let metadata = json_column(row, 8)?;

    let role = AgentRole::from_str(&role_raw)
        .map_err(|e| SqlError::FromSqlConversionFailure(3, rusqlite_type(), Box::new(e)))?;
    let state = AgentState::from_str(&state_raw)
        .map_err(|e| SqlError::FromSqlConversionFailure(5, rusqlite_type(), Box::new(e)))?;

    Ok(Agent {
        id: AgentId::from(id),
        session_id: SessionId::from(session_id),
        name,
        role,
        specialization,
        state,
        spawned_at,
        boundary_config: boundary_config
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| SqlError::FromSqlConversionFailure(7, rusqlite_type(), Box::new(e)))?,
        metadata,
    })
}

pub fn context_from_row(row: &Row) -> Result<ContextEntry, SqlError> {
    let session_id: String = row.get(0)?;
    let key: String = row.get(1)?;
    let agent_id: Option<String> = row.get(2)?;
    let value = json_column(row, 3)?;
    let updated_at: String = row.get(4)?;

    Ok(ContextEntry {
        session_id: SessionId::from(session_id),
        key,
        agent_id: agent_id.map(AgentId::from),
        value,
        updated_at,
    })
}
