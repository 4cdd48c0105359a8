//! In-memory entity cache
//!
//! Uses DashMap for lock-free concurrent access. Contents are lost on drop.

use dashmap::DashMap;
use prtg_model::Entity;
use tracing::{debug, warn};

use crate::error::Result;
use crate::traits::{sort_by_id, ContentFilter, EntityCache};

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entity>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all entries (useful for testing)
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl EntityCache for MemoryCache {
    fn write(&self, entities: &[Entity], force: bool) -> Result<()> {
        for entity in entities {
            let Some(id) = entity.id() else {
                warn!("Skipping entity without id: {}", entity);
                continue;
            };
            if force || !self.entries.contains_key(id) {
                debug!("Caching {}", entity);
                self.entries.insert(id.to_string(), entity.clone());
            } else {
                debug!("Object {} already cached", id);
            }
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Entity>> {
        Ok(self.entries.get(id).map(|entry| entry.value().clone()))
    }

    fn get_by_kind(&self, filter: ContentFilter) -> Result<Vec<Entity>> {
        let mut entities: Vec<Entity> = self
            .entries
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        sort_by_id(&mut entities);
        Ok(entities)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
