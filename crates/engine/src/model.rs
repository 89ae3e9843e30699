use std::collections::BTreeMap;

use timeslice_core::{NodeId, value::Data};

/// A link write: the composite key of participating entities and the
/// window over which they are linked. Keys are kept sorted by type name,
/// which is the canonical chain order.
#[derive(Debug, Clone)]
pub struct LinkWrite {
    pub keys: BTreeMap<String, u64>,
    pub begin: i64,
    pub end: i64,
    pub actor: String,
    pub data: Option<Data>,
}

impl LinkWrite {
    /// Always-valid link between `keys`.
    pub fn new<I, K>(keys: I, actor: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (K, u64)>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            begin: 0,
            end: 0,
            actor: actor.into(),
            data: None,
        }
    }

    pub fn with_window(mut self, begin: i64, end: i64) -> Self {
        self.begin = begin;
        self.end = end;
        self
    }

    pub fn with_data(mut self, data: Data) -> Self {
        self.data = Some(data);
        self
    }
}

/// A field-level override on one entity.
#[derive(Debug, Clone)]
pub struct OverrideWrite {
    pub entity_type: String,
    pub entity_id: u64,
    pub begin: i64,
    pub end: i64,
    pub actor: String,
    pub data: Data,
}

impl OverrideWrite {
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: u64,
        actor: impl Into<String>,
        data: Data,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
            begin: 0,
            end: 0,
            actor: actor.into(),
            data,
        }
    }

    pub fn with_window(mut self, begin: i64, end: i64) -> Self {
        self.begin = begin;
        self.end = end;
        self
    }
}

/// One link fact as seen by readers: every participating entity by type
/// name, plus the leaf's window and provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkView {
    pub node: NodeId,
    pub entities: BTreeMap<String, u64>,
    pub begin: i64,
    pub end: i64,
    pub timestamp: i64,
    pub actor: String,
    pub data: Option<Data>,
    pub idle: bool,
}

impl LinkView {
    pub fn get(&self, entity_type: &str) -> Option<u64> {
        self.entities.get(entity_type).copied()
    }

    pub fn has_all(&self, entity_types: &[&str]) -> bool {
        entity_types.iter().all(|t| self.entities.contains_key(*t))
    }
}
