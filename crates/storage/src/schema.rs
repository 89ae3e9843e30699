use rusqlite::{Connection, OptionalExtension};

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

/// Create the collections unless the persisted marker for
/// [`SCHEMA_VERSION`] is already present. Returns whether anything ran.
pub fn ensure_schema(conn: &mut Connection) -> Result<bool, StorageError> {
    if marker_present(conn)? {
        log::debug!("schema version {SCHEMA_VERSION} already applied");
        return Ok(false);
    }

    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA_SQL)?;
    tx.execute(
        "INSERT OR IGNORE INTO schema_marker (version, applied_at) VALUES (?1, unixepoch())",
        rusqlite::params![SCHEMA_VERSION],
    )?;
    tx.commit()?;
    log::info!("created schema version {SCHEMA_VERSION}");
    Ok(true)
}

fn marker_present(conn: &Connection) -> Result<bool, StorageError> {
    let table: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'schema_marker'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    if table.is_none() {
        return Ok(false);
    }
    let version: Option<i32> = conn
        .query_row(
            "SELECT version FROM schema_marker WHERE version = ?1",
            rusqlite::params![SCHEMA_VERSION],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version.is_some())
}

// parent_id = 0 marks a chain root; recorded_at = 0 marks an intermediate
// link node. valid_begin / valid_end use 0 as the open sentinel.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_marker (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS entity_registry (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS link_fact (
    id INTEGER PRIMARY KEY,
    parent_id INTEGER NOT NULL DEFAULT 0,
    entity_type INTEGER NOT NULL REFERENCES entity_registry(id),
    entity_id INTEGER NOT NULL,
    valid_begin INTEGER NOT NULL DEFAULT 0,
    valid_end INTEGER NOT NULL DEFAULT 0,
    recorded_at INTEGER NOT NULL DEFAULT 0,
    actor TEXT,
    data BLOB,
    idle INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_link_fact_key ON link_fact (entity_type, entity_id, parent_id);
CREATE INDEX IF NOT EXISTS idx_link_fact_parent ON link_fact (parent_id);

CREATE TABLE IF NOT EXISTS override_fact (
    id INTEGER PRIMARY KEY,
    entity_type INTEGER NOT NULL REFERENCES entity_registry(id),
    entity_id INTEGER NOT NULL,
    valid_begin INTEGER NOT NULL DEFAULT 0,
    valid_end INTEGER NOT NULL DEFAULT 0,
    recorded_at INTEGER NOT NULL,
    actor TEXT NOT NULL,
    data BLOB NOT NULL,
    idle INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_override_fact_entity ON override_fact (entity_type, entity_id, valid_begin);

CREATE TABLE IF NOT EXISTS override_aggregate (
    id INTEGER PRIMARY KEY,
    entity_type INTEGER NOT NULL REFERENCES entity_registry(id),
    entity_id INTEGER NOT NULL,
    valid_begin INTEGER NOT NULL,
    valid_end INTEGER NOT NULL,
    data BLOB NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_override_aggregate_seek ON override_aggregate (entity_type, entity_id, valid_begin);

CREATE TABLE IF NOT EXISTS link_aggregate (
    id INTEGER PRIMARY KEY,
    entity_type INTEGER NOT NULL REFERENCES entity_registry(id),
    entity_id INTEGER NOT NULL,
    valid_begin INTEGER NOT NULL,
    valid_end INTEGER NOT NULL,
    data BLOB NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_link_aggregate_seek ON link_aggregate (entity_type, entity_id, valid_begin);
";
