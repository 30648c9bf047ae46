//! The schema, expressed as an ordered list of forward-only migrations.
//!
//! Each entry is applied in its own transaction, in ascending version
//! order, exactly once. `Store::open` creates `schema_migrations` if
//! missing and applies every migration whose version exceeds
//! `MAX(version)`.

/// One forward-only schema change.
pub struct Migration {
    /// Monotonic version number.
    pub version: i64,
    /// The DDL/DML to apply.
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: r"
        CREATE TABLE sessions (
            id                  TEXT PRIMARY KEY,
            objective           TEXT NOT NULL,
            state               TEXT NOT NULL,
            started_at          TEXT NOT NULL,
            ended_at            TEXT,
            parent_session_id   TEXT REFERENCES sessions(id),
            config_snapshot     TEXT,
            context_summary     TEXT,
            total_cost_usd      REAL NOT NULL DEFAULT 0,
            total_input_tokens  INTEGER NOT NULL DEFAULT 0,
            total_output_tokens INTEGER NOT NULL DEFAULT 0,
            metadata            TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE agents (
            id              TEXT PRIMARY KEY,
            session_id      TEXT NOT NULL REFERENCES sessions(id),
            name            TEXT NOT NULL,
            role            TEXT NOT NULL,
            specialization  TEXT,
            state           TEXT NOT NULL,
            spawned_at      TEXT NOT NULL,
            boundary_config TEXT,
            metadata        TEXT NOT NULL DEFAULT '{}',
            UNIQUE(session_id, name)
        );

        CREATE TABLE audit_events (
            id              TEXT PRIMARY KEY,
            session_id      TEXT NOT NULL REFERENCES sessions(id),
            agent_id        TEXT,
            sequence        INTEGER NOT NULL,
            timestamp       TEXT NOT NULL,
            event_type      TEXT NOT NULL,
            action          TEXT NOT NULL,
            details         TEXT NOT NULL DEFAULT '{}',
            files_affected  TEXT NOT NULL DEFAULT '[]',
            gate_id         TEXT,
            hmac            TEXT,
            UNIQUE(session_id, sequence)
        );
        CREATE INDEX idx_audit_events_session_seq ON audit_events(session_id, sequence DESC);
        CREATE INDEX idx_audit_events_agent ON audit_events(session_id, agent_id);

        CREATE TABLE context_store (
            session_id  TEXT NOT NULL REFERENCES sessions(id),
            key         TEXT NOT NULL,
            agent_id    TEXT,
            value       TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            PRIMARY KEY (session_id, key)
        );

        CREATE TABLE file_locks (
            path        TEXT NOT NULL,
            session_id  TEXT NOT NULL REFERENCES sessions(id),
            agent_id    TEXT NOT NULL,
            acquired_at TEXT NOT NULL,
            expires_at  TEXT,
            PRIMARY KEY (path, session_id)
        );

        CREATE TABLE boundary_violations (
            id                  TEXT PRIMARY KEY,
            session_id          TEXT NOT NULL REFERENCES sessions(id),
            agent_id            TEXT,
            timestamp           TEXT NOT NULL,
            file_path           TEXT NOT NULL,
            violation_type      TEXT NOT NULL,
            enforcement_action  TEXT NOT NULL,
            details             TEXT NOT NULL DEFAULT '{}'
        );
        CREATE INDEX idx_boundary_violations_session ON boundary_violations(session_id, timestamp DESC);
    ",
}];
