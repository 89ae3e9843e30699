pub mod config;
pub mod error;
pub mod model;
pub mod registry;
pub mod resolver;

mod aggregator;

pub use config::EngineConfig;
pub use error::{EngineError, ValidationError};
pub use model::{LinkView, LinkWrite, OverrideWrite};
pub use registry::EntityRegistry;

use std::collections::BTreeMap;
use std::path::Path;

use timeslice_core::{
    clock::WriteClock,
    ids::*,
    link::LinkComposition,
    timeline::Interval,
    value::Data,
};
use timeslice_storage::{
    LinkSegment, NewLinkNode, NewOverride, OverrideFact, SqliteStore, StateSegment, Store,
};

/// Field names the engine stamps on every fact itself.
const RESERVED_FIELDS: [&str; 2] = ["actor", "timestamp"];

fn validate_provenance(actor: &str, data: Option<&Data>) -> Result<(), ValidationError> {
    if actor.trim().is_empty() {
        return Err(ValidationError::MissingActor);
    }
    if let Some(data) = data
        && let Some(field) = RESERVED_FIELDS.iter().find(|f| data.contains_key(**f))
    {
        return Err(ValidationError::ReservedField(field.to_string()));
    }
    Ok(())
}

fn validate_window(begin: i64, end: i64) -> Result<(), ValidationError> {
    if !Interval::new(begin, end).is_well_formed() {
        return Err(ValidationError::InvalidInterval { begin, end });
    }
    Ok(())
}

fn validate_type_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyTypeName);
    }
    Ok(())
}

/// Records link and override facts, keeps their per-entity timelines
/// precomputed, and answers point-in-time queries against them.
pub struct Engine<S: Store = SqliteStore> {
    store: S,
    registry: EntityRegistry,
    clock: WriteClock,
    config: EngineConfig,
}

impl Engine<SqliteStore> {
    pub fn open<P: AsRef<Path>>(path: P, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let store = SqliteStore::open(path, &config.store)?;
        Ok(Self::new(store, config))
    }

    pub fn open_in_memory() -> Result<Self, EngineError> {
        let store = SqliteStore::open_in_memory()?;
        Ok(Self::new(store, EngineConfig::default()))
    }
}

impl<S: Store> Engine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            registry: EntityRegistry::new(),
            clock: WriteClock::new(),
            config,
        }
    }

    /// Replace the clock that stamps provenance timestamps.
    pub fn with_clock(mut self, clock: WriteClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ensure_schema(&mut self) -> Result<bool, EngineError> {
        Ok(self.store.ensure_schema()?)
    }

    // ========================================================================
    // Entity Registry
    // ========================================================================

    /// Numeric id for `name`, registering it if unseen.
    pub fn entity_type(&mut self, name: &str) -> Result<EntityTypeId, EngineError> {
        validate_type_name(name)?;
        Ok(self.registry.resolve(&mut self.store, name)?)
    }

    pub fn entity_types(&self) -> Result<Vec<(EntityTypeId, String)>, EngineError> {
        Ok(self.store.entity_types()?)
    }

    fn entity_ref(&mut self, entity_type: &str, entity_id: u64) -> Result<EntityRef, EngineError> {
        Ok(EntityRef::new(self.entity_type(entity_type)?, entity_id))
    }

    // ========================================================================
    // Fact Recording
    // ========================================================================

    /// Record a link between every entity in `write.keys`. Intermediate
    /// chain nodes are found or created; a new leaf carries the window.
    /// Every participating entity's link timeline is rebuilt in the same
    /// transaction. Returns the leaf id.
    pub fn record_link(&mut self, write: LinkWrite) -> Result<NodeId, EngineError> {
        if let Err(e) = validate_provenance(&write.actor, write.data.as_ref())
            .and_then(|()| validate_window(write.begin, write.end))
        {
            log::warn!("rejected link write: {e}");
            return Err(e.into());
        }
        if write.keys.len() < 2 {
            log::warn!("rejected link write with {} entities", write.keys.len());
            return Err(EngineError::Configuration(
                "a link needs at least two entities".into(),
            ));
        }
        if write.keys.len() > self.config.max_link_depth + 1 {
            return Err(EngineError::Configuration(format!(
                "a link may span at most {} entities",
                self.config.max_link_depth + 1
            )));
        }

        for name in write.keys.keys() {
            if let Err(e) = validate_type_name(name) {
                log::warn!("rejected link write: {e}");
                return Err(e.into());
            }
        }

        // Registration is idempotent and stays outside the write transaction
        // so the registry cache never holds rolled-back ids.
        let mut chain = Vec::with_capacity(write.keys.len());
        for (name, id) in &write.keys {
            chain.push(self.entity_ref(name, *id)?);
        }
        let Some((leaf_entity, prefix)) = chain.split_last() else {
            return Err(EngineError::Configuration("empty link".into()));
        };

        let timestamp = self.clock.tick()?;
        let max_depth = self.config.max_link_depth;
        let leaf = self.store.with_transaction(|store| -> Result<NodeId, EngineError> {
            let mut parent_id = None;
            for entity in prefix {
                parent_id = Some(store.find_or_create_link_node(*entity, parent_id)?.id);
            }
            let leaf = store.create_link_node(&NewLinkNode {
                parent_id,
                entity: *leaf_entity,
                begin: write.begin,
                end: write.end,
                timestamp,
                actor: Some(write.actor.clone()),
                data: write.data.clone(),
            })?;
            for entity in &chain {
                aggregator::rebuild_links(store, *entity, max_depth)?;
            }
            Ok(leaf.id)
        })?;

        log::debug!("recorded link {leaf} across {} entities", chain.len());
        Ok(leaf)
    }

    /// Record a field override for one entity and rebuild its state
    /// timeline in the same transaction. Returns the fact id.
    pub fn record_override(&mut self, write: OverrideWrite) -> Result<FactId, EngineError> {
        if let Err(e) = validate_provenance(&write.actor, Some(&write.data))
            .and_then(|()| validate_window(write.begin, write.end))
            .and_then(|()| validate_type_name(&write.entity_type))
        {
            log::warn!("rejected override write: {e}");
            return Err(e.into());
        }

        let entity = self.entity_ref(&write.entity_type, write.entity_id)?;
        let timestamp = self.clock.tick()?;
        let fact = self.store.with_transaction(|store| -> Result<FactId, EngineError> {
            let fact = store.create_override(&NewOverride {
                entity,
                begin: write.begin,
                end: write.end,
                timestamp,
                actor: write.actor,
                data: write.data,
            })?;
            aggregator::rebuild_overrides(store, entity)?;
            Ok(fact.id)
        })?;

        log::debug!("recorded override {fact} for {entity}");
        Ok(fact)
    }

    /// Soft-delete (or restore) a link leaf. The fact stays in storage; the
    /// link timeline of every entity on its chain is rebuilt.
    pub fn set_link_idle(&mut self, node: NodeId, idle: bool) -> Result<(), EngineError> {
        let leaf = match self.store.get_link_node(node)? {
            Some(leaf) if leaf.is_leaf() => leaf,
            _ => return Err(EngineError::FactNotFound(format!("link fact {node}"))),
        };
        let max_depth = self.config.max_link_depth;
        self.store.with_transaction(|store| -> Result<(), EngineError> {
            store.set_link_idle(node, idle)?;
            for entity in resolver::chain(store, &leaf, max_depth)? {
                aggregator::rebuild_links(store, entity, max_depth)?;
            }
            Ok(())
        })?;
        log::debug!("link {node} idle = {idle}");
        Ok(())
    }

    /// Soft-delete (or restore) an override fact and rebuild its entity's
    /// state timeline.
    pub fn set_override_idle(&mut self, fact: FactId, idle: bool) -> Result<(), EngineError> {
        let entity = self
            .store
            .get_override(fact)?
            .ok_or_else(|| EngineError::FactNotFound(format!("override fact {fact}")))?
            .entity;
        self.store.with_transaction(|store| -> Result<(), EngineError> {
            store.set_override_idle(fact, idle)?;
            aggregator::rebuild_overrides(store, entity)?;
            Ok(())
        })?;
        log::debug!("override {fact} idle = {idle}");
        Ok(())
    }

    // ========================================================================
    // Aggregation
    // ========================================================================

    /// Rebuild an entity's state timeline from scratch. Returns the number of
    /// segments written.
    pub fn recompute_overrides(
        &mut self,
        entity_type: &str,
        entity_id: u64,
    ) -> Result<usize, EngineError> {
        let entity = self.entity_ref(entity_type, entity_id)?;
        self.store
            .with_transaction(|store| aggregator::rebuild_overrides(store, entity))
    }

    /// Rebuild an entity's link timeline from scratch. Returns the number of
    /// segments written.
    pub fn recompute_links(
        &mut self,
        entity_type: &str,
        entity_id: u64,
    ) -> Result<usize, EngineError> {
        let entity = self.entity_ref(entity_type, entity_id)?;
        let max_depth = self.config.max_link_depth;
        self.store
            .with_transaction(|store| aggregator::rebuild_links(store, entity, max_depth))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The merged override data of an entity at `as_of` (epoch seconds), or
    /// `None` when no segment covers that instant.
    pub fn query_state(
        &mut self,
        entity_type: &str,
        entity_id: u64,
        as_of: i64,
    ) -> Result<Option<Data>, EngineError> {
        let entity = self.entity_ref(entity_type, entity_id)?;
        let segment = self.store.override_segment_at(entity, as_of)?;
        Ok(segment
            .filter(|segment| segment.contains(as_of))
            .map(|segment| segment.data))
    }

    /// Every link fact involving the entity that is valid at `as_of`. When
    /// `filter` is non-empty, only links that include all of the named
    /// entity types are returned.
    pub fn query_links(
        &mut self,
        entity_type: &str,
        entity_id: u64,
        as_of: i64,
        filter: &[&str],
    ) -> Result<Vec<LinkView>, EngineError> {
        let entity = self.entity_ref(entity_type, entity_id)?;
        let segment = match self.store.link_segment_at(entity, as_of)? {
            Some(segment) if segment.contains(as_of) => segment,
            _ => return Ok(Vec::new()),
        };

        let mut views = Vec::with_capacity(segment.data.len());
        for composition in segment.data {
            let view = self.expand(composition, false)?;
            if view.has_all(filter) {
                views.push(view);
            }
        }
        Ok(views)
    }

    /// The full precomputed state timeline of an entity.
    pub fn state_timeline(
        &mut self,
        entity_type: &str,
        entity_id: u64,
    ) -> Result<Vec<StateSegment>, EngineError> {
        let entity = self.entity_ref(entity_type, entity_id)?;
        Ok(self.store.override_segments(entity)?)
    }

    /// The full precomputed link timeline of an entity.
    pub fn link_timeline(
        &mut self,
        entity_type: &str,
        entity_id: u64,
    ) -> Result<Vec<LinkSegment>, EngineError> {
        let entity = self.entity_ref(entity_type, entity_id)?;
        Ok(self.store.link_segments(entity)?)
    }

    /// Every raw override fact recorded for an entity, idle ones included.
    pub fn override_history(
        &mut self,
        entity_type: &str,
        entity_id: u64,
    ) -> Result<Vec<OverrideFact>, EngineError> {
        let entity = self.entity_ref(entity_type, entity_id)?;
        Ok(self.store.overrides_for(entity)?)
    }

    /// Every link fact reachable from an entity, idle ones included, in
    /// recording order.
    pub fn link_history(
        &mut self,
        entity_type: &str,
        entity_id: u64,
    ) -> Result<Vec<LinkView>, EngineError> {
        let entity = self.entity_ref(entity_type, entity_id)?;
        let max_depth = self.config.max_link_depth;

        let mut leaves = BTreeMap::new();
        for node in self.store.link_nodes_for(entity)? {
            for leaf in resolver::collect_leaves(&self.store, &node, max_depth)? {
                leaves.entry(leaf.id).or_insert(leaf);
            }
        }

        let mut views = Vec::with_capacity(leaves.len());
        for leaf in leaves.into_values() {
            let composition = resolver::composition(&self.store, &leaf, max_depth)?;
            views.push(self.expand(composition, leaf.idle)?);
        }
        Ok(views)
    }

    fn expand(
        &mut self,
        composition: LinkComposition,
        idle: bool,
    ) -> Result<LinkView, EngineError> {
        let mut entities = BTreeMap::new();
        for entity in &composition.entities {
            let name = self
                .registry
                .name_of(&self.store, entity.entity_type)?
                .ok_or(EngineError::UnknownEntityType(entity.entity_type.get()))?;
            entities.insert(name, entity.entity_id);
        }
        Ok(LinkView {
            node: composition.node,
            entities,
            begin: composition.begin,
            end: composition.end,
            timestamp: composition.timestamp,
            actor: composition.actor,
            data: composition.data,
            idle,
        })
    }
}
