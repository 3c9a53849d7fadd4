//! In-process record store.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use quillflow_core::error::Result;
use quillflow_core::model::{Edit, Entity, Query};
use quillflow_core::traits::{Batch, RecordStore};

#[derive(Debug, Default)]
struct Inner {
    entities: BTreeMap<String, Entity>,
    edits: Vec<Edit>,
    last_number: u32,
}

/// Keeps the latest version of every entity plus the full edit trail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entities
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.entities.get(id).cloned())
    }

    fn query(&self, query: &Query) -> Result<Vec<Entity>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner
            .entities
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect())
    }

    fn edit_history(&self, entity_id: &str) -> Result<Vec<Edit>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner
            .edits
            .iter()
            .filter(|e| e.entity_id == entity_id)
            .cloned()
            .collect())
    }

    fn commit(&self, batch: Batch) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        for mut entity in batch.entities {
            let version = inner
                .entities
                .get(entity.id())
                .map(|e| e.version() + 1)
                .unwrap_or(1);
            entity.set_version(version);
            inner.entities.insert(entity.id().to_string(), entity);
        }
        inner.edits.extend(batch.edits);
        Ok(())
    }

    fn next_paper_number(&self) -> Result<u32> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.last_number += 1;
        Ok(inner.last_number)
    }
}
