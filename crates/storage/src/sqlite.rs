use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use timeslice_core::{
    ids::*,
    link::{decode_compositions, encode_compositions},
    timeline::Segment,
    value::{decode_data, encode_data},
};

use crate::config::StoreConfig;
use crate::error::StorageError;
use crate::traits::{
    LinkNode, LinkSegment, NewLinkNode, NewOverride, OverrideFact, StateSegment, Store,
};

const LINK_COLUMNS: &str =
    "id, parent_id, entity_type, entity_id, valid_begin, valid_end, recorded_at, actor, data, idle";
const OVERRIDE_COLUMNS: &str =
    "id, entity_type, entity_id, valid_begin, valid_end, recorded_at, actor, data, idle";

const OVERRIDE_AGGREGATE: &str = "override_aggregate";
const LINK_AGGREGATE: &str = "link_aggregate";

type LinkRow = (
    i64,
    i64,
    i64,
    i64,
    i64,
    i64,
    i64,
    Option<String>,
    Option<Vec<u8>>,
    bool,
);

type OverrideRow = (i64, i64, i64, i64, i64, i64, String, Vec<u8>, bool);

fn serialization(e: impl std::fmt::Display) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Root nodes are stored with `parent_id = 0`.
fn parent_key(parent_id: Option<NodeId>) -> i64 {
    parent_id.map_or(0, |p| p.get())
}

fn entity_params(entity: EntityRef) -> (i64, i64) {
    (entity.entity_type.get(), entity.entity_id as i64)
}

fn read_link_row(row: &rusqlite::Row) -> rusqlite::Result<LinkRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn link_node_from_row(row: LinkRow) -> Result<LinkNode, StorageError> {
    let (id, parent_id, entity_type, entity_id, begin, end, timestamp, actor, data, idle) = row;
    let data = data
        .as_deref()
        .map(decode_data)
        .transpose()
        .map_err(serialization)?;
    Ok(LinkNode {
        id: NodeId::new(id),
        parent_id: (parent_id != 0).then(|| NodeId::new(parent_id)),
        entity: EntityRef::new(EntityTypeId::new(entity_type), entity_id as u64),
        begin,
        end,
        timestamp,
        actor,
        data,
        idle,
    })
}

fn read_override_row(row: &rusqlite::Row) -> rusqlite::Result<OverrideRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn override_from_row(row: OverrideRow) -> Result<OverrideFact, StorageError> {
    let (id, entity_type, entity_id, begin, end, timestamp, actor, data, idle) = row;
    Ok(OverrideFact {
        id: FactId::new(id),
        entity: EntityRef::new(EntityTypeId::new(entity_type), entity_id as u64),
        begin,
        end,
        timestamp,
        actor,
        data: decode_data(&data).map_err(serialization)?,
        idle,
    })
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P, config: &StoreConfig) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::init(conn, config)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, &StoreConfig::default())
    }

    fn init(conn: Connection, config: &StoreConfig) -> Result<Self, StorageError> {
        conn.execute_batch(&config.pragmas())?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn query_link_nodes<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<LinkNode>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, read_link_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(link_node_from_row(row?)?);
        }
        Ok(result)
    }

    /// Delete-all-then-insert-all under a savepoint, so the swap is atomic
    /// whether or not an outer transaction is open.
    fn replace_segments(
        &mut self,
        table: &str,
        entity: EntityRef,
        rows: Vec<(i64, i64, Vec<u8>)>,
    ) -> Result<(), StorageError> {
        let (entity_type, entity_id) = entity_params(entity);
        let sp = self.conn.savepoint()?;
        sp.execute(
            &format!("DELETE FROM {table} WHERE entity_type = ?1 AND entity_id = ?2"),
            rusqlite::params![entity_type, entity_id],
        )?;
        {
            let mut stmt = sp.prepare(&format!(
                "INSERT INTO {table} (entity_type, entity_id, valid_begin, valid_end, data) VALUES (?1, ?2, ?3, ?4, ?5)"
            ))?;
            for (begin, end, data) in rows {
                stmt.execute(rusqlite::params![entity_type, entity_id, begin, end, data])?;
            }
        }
        sp.commit()?;
        Ok(())
    }

    fn segments(
        &self,
        table: &str,
        entity: EntityRef,
    ) -> Result<Vec<(i64, i64, Vec<u8>)>, StorageError> {
        let (entity_type, entity_id) = entity_params(entity);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT valid_begin, valid_end, data FROM {table} WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY valid_begin"
        ))?;
        let rows = stmt.query_map(rusqlite::params![entity_type, entity_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn segment_at(
        &self,
        table: &str,
        entity: EntityRef,
        at: i64,
    ) -> Result<Option<(i64, i64, Vec<u8>)>, StorageError> {
        let (entity_type, entity_id) = entity_params(entity);
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT valid_begin, valid_end, data FROM {table} WHERE entity_type = ?1 AND entity_id = ?2 AND valid_begin <= ?3 ORDER BY valid_begin DESC LIMIT 1"
                ),
                rusqlite::params![entity_type, entity_id, at],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        Ok(row)
    }
}

fn state_segment(row: (i64, i64, Vec<u8>)) -> Result<StateSegment, StorageError> {
    let (begin, end, data) = row;
    Ok(Segment {
        begin,
        end,
        data: decode_data(&data).map_err(serialization)?,
    })
}

fn link_segment(row: (i64, i64, Vec<u8>)) -> Result<LinkSegment, StorageError> {
    let (begin, end, data) = row;
    Ok(Segment {
        begin,
        end,
        data: decode_compositions(&data).map_err(serialization)?,
    })
}

impl Store for SqliteStore {
    fn ensure_schema(&mut self) -> Result<bool, StorageError> {
        crate::schema::ensure_schema(&mut self.conn)
    }

    fn begin(&mut self) -> Result<(), StorageError> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn find_entity_type(&self, name: &str) -> Result<Option<EntityTypeId>, StorageError> {
        let id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM entity_registry WHERE name = ?1",
                rusqlite::params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(EntityTypeId::new))
    }

    fn create_entity_type(&mut self, name: &str) -> Result<EntityTypeId, StorageError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO entity_registry (name) VALUES (?1)",
            rusqlite::params![name],
        )?;
        self.find_entity_type(name)?
            .ok_or_else(|| StorageError::NotFound(format!("entity type {name}")))
    }

    fn entity_type_name(&self, id: EntityTypeId) -> Result<Option<String>, StorageError> {
        let name = self
            .conn
            .query_row(
                "SELECT name FROM entity_registry WHERE id = ?1",
                rusqlite::params![id.get()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }

    fn entity_types(&self) -> Result<Vec<(EntityTypeId, String)>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM entity_registry ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((EntityTypeId::new(row.get(0)?), row.get::<_, String>(1)?))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn find_link_node(
        &self,
        entity: EntityRef,
        parent_id: Option<NodeId>,
    ) -> Result<Option<LinkNode>, StorageError> {
        let (entity_type, entity_id) = entity_params(entity);
        let nodes = self.query_link_nodes(
            &format!(
                "SELECT {LINK_COLUMNS} FROM link_fact WHERE entity_type = ?1 AND entity_id = ?2 AND parent_id = ?3 AND recorded_at = 0 ORDER BY id LIMIT 1"
            ),
            rusqlite::params![entity_type, entity_id, parent_key(parent_id)],
        )?;
        Ok(nodes.into_iter().next())
    }

    fn create_link_node(&mut self, node: &NewLinkNode) -> Result<LinkNode, StorageError> {
        let (entity_type, entity_id) = entity_params(node.entity);
        let data = node
            .data
            .as_ref()
            .map(encode_data)
            .transpose()
            .map_err(serialization)?;
        self.conn.execute(
            "INSERT INTO link_fact (parent_id, entity_type, entity_id, valid_begin, valid_end, recorded_at, actor, data) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                parent_key(node.parent_id),
                entity_type,
                entity_id,
                node.begin,
                node.end,
                node.timestamp,
                node.actor,
                data,
            ],
        )?;
        Ok(LinkNode {
            id: NodeId::new(self.conn.last_insert_rowid()),
            parent_id: node.parent_id,
            entity: node.entity,
            begin: node.begin,
            end: node.end,
            timestamp: node.timestamp,
            actor: node.actor.clone(),
            data: node.data.clone(),
            idle: false,
        })
    }

    fn get_link_node(&self, id: NodeId) -> Result<Option<LinkNode>, StorageError> {
        let nodes = self.query_link_nodes(
            &format!("SELECT {LINK_COLUMNS} FROM link_fact WHERE id = ?1"),
            rusqlite::params![id.get()],
        )?;
        Ok(nodes.into_iter().next())
    }

    fn link_children(&self, parent_id: NodeId) -> Result<Vec<LinkNode>, StorageError> {
        self.query_link_nodes(
            &format!("SELECT {LINK_COLUMNS} FROM link_fact WHERE parent_id = ?1 ORDER BY id"),
            rusqlite::params![parent_id.get()],
        )
    }

    fn link_nodes_for(&self, entity: EntityRef) -> Result<Vec<LinkNode>, StorageError> {
        let (entity_type, entity_id) = entity_params(entity);
        self.query_link_nodes(
            &format!(
                "SELECT {LINK_COLUMNS} FROM link_fact WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY id"
            ),
            rusqlite::params![entity_type, entity_id],
        )
    }

    fn set_link_idle(&mut self, id: NodeId, idle: bool) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "UPDATE link_fact SET idle = ?1 WHERE id = ?2 AND recorded_at != 0",
            rusqlite::params![idle, id.get()],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("link fact {id}")));
        }
        Ok(())
    }

    fn create_override(&mut self, fact: &NewOverride) -> Result<OverrideFact, StorageError> {
        let (entity_type, entity_id) = entity_params(fact.entity);
        let data = encode_data(&fact.data).map_err(serialization)?;
        self.conn.execute(
            "INSERT INTO override_fact (entity_type, entity_id, valid_begin, valid_end, recorded_at, actor, data) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                entity_type,
                entity_id,
                fact.begin,
                fact.end,
                fact.timestamp,
                fact.actor,
                data,
            ],
        )?;
        Ok(OverrideFact {
            id: FactId::new(self.conn.last_insert_rowid()),
            entity: fact.entity,
            begin: fact.begin,
            end: fact.end,
            timestamp: fact.timestamp,
            actor: fact.actor.clone(),
            data: fact.data.clone(),
            idle: false,
        })
    }

    fn get_override(&self, id: FactId) -> Result<Option<OverrideFact>, StorageError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {OVERRIDE_COLUMNS} FROM override_fact WHERE id = ?1"),
                rusqlite::params![id.get()],
                read_override_row,
            )
            .optional()?;
        row.map(override_from_row).transpose()
    }

    fn overrides_for(&self, entity: EntityRef) -> Result<Vec<OverrideFact>, StorageError> {
        let (entity_type, entity_id) = entity_params(entity);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OVERRIDE_COLUMNS} FROM override_fact WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY valid_begin, id"
        ))?;
        let rows = stmt.query_map(rusqlite::params![entity_type, entity_id], read_override_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(override_from_row(row?)?);
        }
        Ok(result)
    }

    fn set_override_idle(&mut self, id: FactId, idle: bool) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "UPDATE override_fact SET idle = ?1 WHERE id = ?2",
            rusqlite::params![idle, id.get()],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("override fact {id}")));
        }
        Ok(())
    }

    fn replace_override_segments(
        &mut self,
        entity: EntityRef,
        segments: &[StateSegment],
    ) -> Result<(), StorageError> {
        let mut rows = Vec::with_capacity(segments.len());
        for segment in segments {
            let data = encode_data(&segment.data).map_err(serialization)?;
            rows.push((segment.begin, segment.end, data));
        }
        self.replace_segments(OVERRIDE_AGGREGATE, entity, rows)
    }

    fn override_segments(&self, entity: EntityRef) -> Result<Vec<StateSegment>, StorageError> {
        self.segments(OVERRIDE_AGGREGATE, entity)?
            .into_iter()
            .map(state_segment)
            .collect()
    }

    fn override_segment_at(
        &self,
        entity: EntityRef,
        at: i64,
    ) -> Result<Option<StateSegment>, StorageError> {
        self.segment_at(OVERRIDE_AGGREGATE, entity, at)?
            .map(state_segment)
            .transpose()
    }

    fn replace_link_segments(
        &mut self,
        entity: EntityRef,
        segments: &[LinkSegment],
    ) -> Result<(), StorageError> {
        let mut rows = Vec::with_capacity(segments.len());
        for segment in segments {
            let data = encode_compositions(&segment.data).map_err(serialization)?;
            rows.push((segment.begin, segment.end, data));
        }
        self.replace_segments(LINK_AGGREGATE, entity, rows)
    }

    fn link_segments(&self, entity: EntityRef) -> Result<Vec<LinkSegment>, StorageError> {
        self.segments(LINK_AGGREGATE, entity)?
            .into_iter()
            .map(link_segment)
            .collect()
    }

    fn link_segment_at(
        &self,
        entity: EntityRef,
        at: i64,
    ) -> Result<Option<LinkSegment>, StorageError> {
        self.segment_at(LINK_AGGREGATE, entity, at)?
            .map(link_segment)
            .transpose()
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.conn.path())
            .finish()
    }
}
