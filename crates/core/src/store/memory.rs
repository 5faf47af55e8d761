use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::entity::{DataEntity, EntityKey};
use crate::error::Result;

use super::DataStore;

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    uri: String,
    entities: BTreeMap<EntityKey, DataEntity>,
    schemas: HashMap<String, BTreeSet<String>>,
    closes: AtomicUsize,
}

impl MemoryStore {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn insert(&mut self, entity: DataEntity) {
        self.entities.insert(entity.key.clone(), entity);
    }

    pub fn with(mut self, entity: DataEntity) -> Self {
        self.insert(entity);
        self
    }

    pub fn with_schema<S: Into<String>>(mut self, name: &str, paths: impl IntoIterator<Item = S>) -> Self {
        self.schemas
            .insert(name.to_string(), paths.into_iter().map(Into::into).collect());
        self
    }

    /// How many times `close` has been called.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl DataStore for MemoryStore {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn list_entity_names(&self) -> Result<Vec<String>> {
        let names: BTreeSet<&str> = self.entities.keys().map(|k| k.name.as_str()).collect();
        Ok(names.into_iter().map(String::from).collect())
    }

    fn list_occurrences(&self, name: &str) -> Result<Vec<u32>> {
        Ok(self
            .entities
            .keys()
            .filter(|k| k.name == name)
            .map(|k| k.occurrence)
            .collect())
    }

    fn get(&self, name: &str, occurrence: u32) -> Result<Option<DataEntity>> {
        Ok(self.entities.get(&EntityKey::new(name, occurrence)).cloned())
    }

    fn schema_paths(&self, name: &str) -> Result<Option<BTreeSet<String>>> {
        Ok(self.schemas.get(name).cloned())
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
