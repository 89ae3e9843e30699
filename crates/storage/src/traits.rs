use timeslice_core::{
    ids::*,
    link::LinkComposition,
    timeline::{Interval, Segment},
    value::Data,
};

use crate::error::StorageError;

/// Override timeline entry: the merged field map for one slice.
pub type StateSegment = Segment<Data>;

/// Link timeline entry: every composition valid throughout one slice.
pub type LinkSegment = Segment<Vec<LinkComposition>>;

/// One row of the link hierarchy. Intermediate nodes have `timestamp == 0`
/// and no window; leaves carry the validity window and provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkNode {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub entity: EntityRef,
    pub begin: i64,
    pub end: i64,
    pub timestamp: i64,
    pub actor: Option<String>,
    pub data: Option<Data>,
    pub idle: bool,
}

impl LinkNode {
    pub fn is_leaf(&self) -> bool {
        self.timestamp != 0
    }

    pub fn interval(&self) -> Interval {
        Interval::new(self.begin, self.end)
    }
}

#[derive(Debug, Clone)]
pub struct NewLinkNode {
    pub parent_id: Option<NodeId>,
    pub entity: EntityRef,
    pub begin: i64,
    pub end: i64,
    pub timestamp: i64,
    pub actor: Option<String>,
    pub data: Option<Data>,
}

impl NewLinkNode {
    pub fn intermediate(entity: EntityRef, parent_id: Option<NodeId>) -> Self {
        Self {
            parent_id,
            entity,
            begin: 0,
            end: 0,
            timestamp: 0,
            actor: None,
            data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverrideFact {
    pub id: FactId,
    pub entity: EntityRef,
    pub begin: i64,
    pub end: i64,
    pub timestamp: i64,
    pub actor: String,
    pub data: Data,
    pub idle: bool,
}

impl OverrideFact {
    pub fn interval(&self) -> Interval {
        Interval::new(self.begin, self.end)
    }
}

#[derive(Debug, Clone)]
pub struct NewOverride {
    pub entity: EntityRef,
    pub begin: i64,
    pub end: i64,
    pub timestamp: i64,
    pub actor: String,
    pub data: Data,
}

/// Typed persistence for the facts, the precomputed timelines and the
/// entity type registry.
pub trait Store {
    /// Create the collections if the persisted schema marker is missing.
    /// Returns `true` when the schema was created by this call.
    fn ensure_schema(&mut self) -> Result<bool, StorageError>;

    fn begin(&mut self) -> Result<(), StorageError>;

    fn commit(&mut self) -> Result<(), StorageError>;

    fn rollback(&mut self) -> Result<(), StorageError>;

    /// Run `f` in one transaction: committed if it returns `Ok`, rolled back
    /// otherwise.
    fn with_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<StorageError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.rollback() {
                    log::error!("rollback failed: {rollback}");
                }
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Entity registry
    // ------------------------------------------------------------------

    fn find_entity_type(&self, name: &str) -> Result<Option<EntityTypeId>, StorageError>;

    fn create_entity_type(&mut self, name: &str) -> Result<EntityTypeId, StorageError>;

    fn entity_type_name(&self, id: EntityTypeId) -> Result<Option<String>, StorageError>;

    fn entity_types(&self) -> Result<Vec<(EntityTypeId, String)>, StorageError>;

    // ------------------------------------------------------------------
    // Link facts
    // ------------------------------------------------------------------

    /// Find the intermediate node for `entity` under `parent_id`.
    fn find_link_node(
        &self,
        entity: EntityRef,
        parent_id: Option<NodeId>,
    ) -> Result<Option<LinkNode>, StorageError>;

    fn create_link_node(&mut self, node: &NewLinkNode) -> Result<LinkNode, StorageError>;

    fn find_or_create_link_node(
        &mut self,
        entity: EntityRef,
        parent_id: Option<NodeId>,
    ) -> Result<LinkNode, StorageError> {
        match self.find_link_node(entity, parent_id)? {
            Some(node) => Ok(node),
            None => self.create_link_node(&NewLinkNode::intermediate(entity, parent_id)),
        }
    }

    fn get_link_node(&self, id: NodeId) -> Result<Option<LinkNode>, StorageError>;

    fn link_children(&self, parent_id: NodeId) -> Result<Vec<LinkNode>, StorageError>;

    /// Every node, intermediate or leaf, addressing `entity`.
    fn link_nodes_for(&self, entity: EntityRef) -> Result<Vec<LinkNode>, StorageError>;

    fn set_link_idle(&mut self, id: NodeId, idle: bool) -> Result<(), StorageError>;

    // ------------------------------------------------------------------
    // Override facts
    // ------------------------------------------------------------------

    fn create_override(&mut self, fact: &NewOverride) -> Result<OverrideFact, StorageError>;

    fn get_override(&self, id: FactId) -> Result<Option<OverrideFact>, StorageError>;

    /// All facts for `entity`, idle included, ordered by `begin` then id.
    fn overrides_for(&self, entity: EntityRef) -> Result<Vec<OverrideFact>, StorageError>;

    fn set_override_idle(&mut self, id: FactId, idle: bool) -> Result<(), StorageError>;

    // ------------------------------------------------------------------
    // Aggregate segments
    // ------------------------------------------------------------------

    /// Delete every override segment of `entity` and insert `segments`.
    fn replace_override_segments(
        &mut self,
        entity: EntityRef,
        segments: &[StateSegment],
    ) -> Result<(), StorageError>;

    fn override_segments(&self, entity: EntityRef) -> Result<Vec<StateSegment>, StorageError>;

    /// The segment with the greatest `begin <= at`, whether or not it still
    /// covers `at`.
    fn override_segment_at(
        &self,
        entity: EntityRef,
        at: i64,
    ) -> Result<Option<StateSegment>, StorageError>;

    /// Delete every link segment of `entity` and insert `segments`.
    fn replace_link_segments(
        &mut self,
        entity: EntityRef,
        segments: &[LinkSegment],
    ) -> Result<(), StorageError>;

    fn link_segments(&self, entity: EntityRef) -> Result<Vec<LinkSegment>, StorageError>;

    /// The link segment with the greatest `begin <= at`.
    fn link_segment_at(
        &self,
        entity: EntityRef,
        at: i64,
    ) -> Result<Option<LinkSegment>, StorageError>;
}
