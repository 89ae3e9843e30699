use std::collections::HashMap;

use timeslice_core::EntityTypeId;
use timeslice_storage::{StorageError, Store};

/// Write-through cache over the store's `entity_registry` collection.
/// Unseen names are registered on first use.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    by_name: HashMap<String, EntityTypeId>,
    by_id: HashMap<EntityTypeId, String>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve<S: Store>(
        &mut self,
        store: &mut S,
        name: &str,
    ) -> Result<EntityTypeId, StorageError> {
        if let Some(id) = self.by_name.get(name) {
            return Ok(*id);
        }
        let id = match store.find_entity_type(name)? {
            Some(id) => id,
            None => {
                let id = store.create_entity_type(name)?;
                log::debug!("registered entity type {name} as {id}");
                id
            }
        };
        self.remember(id, name);
        Ok(id)
    }

    pub fn name_of<S: Store>(
        &mut self,
        store: &S,
        id: EntityTypeId,
    ) -> Result<Option<String>, StorageError> {
        if let Some(name) = self.by_id.get(&id) {
            return Ok(Some(name.clone()));
        }
        let name = store.entity_type_name(id)?;
        if let Some(name) = &name {
            self.remember(id, name);
        }
        Ok(name)
    }

    fn remember(&mut self, id: EntityTypeId, name: &str) {
        self.by_name.insert(name.to_string(), id);
        self.by_id.insert(id, name.to_string());
    }
}
