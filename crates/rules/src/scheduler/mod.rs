//! Matches loaded rules against the entity catalog.
//!
//! The catalog is walked in enumeration order and, for each entry, the rules
//! in registry order. A rule matches an entry when its first selector
//! accepts the entry and its version specifier accepts the entry's version.
//! Further selectors are literal and pinned, so they are fetched straight
//! from the store; a missing instance drops the candidate without a result.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use ids_core::{CoreError, DataEntity, DataStore, EntityKey};
use tracing::{debug, info};

use crate::rule::{EntityPattern, Rule};

/// Every entity instance in a store, each loaded once.
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    entries: Vec<Arc<DataEntity>>,
}

impl EntityCatalog {
    /// Enumerate names then occurrences, loading each instance.
    pub fn from_store(store: &dyn DataStore) -> Result<Self, CoreError> {
        let mut entries = Vec::new();
        for name in store.list_entity_names()? {
            for occurrence in store.list_occurrences(&name)? {
                match store.get(&name, occurrence)? {
                    Some(entity) => entries.push(Arc::new(entity)),
                    None => debug!(entity = %name, occurrence, "listed occurrence vanished"),
                }
            }
        }
        info!(uri = %store.uri(), entities = entries.len(), "catalog loaded");
        Ok(Self { entries })
    }

    pub fn from_entities(entities: impl IntoIterator<Item = DataEntity>) -> Self {
        Self {
            entries: entities.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn entries(&self) -> &[Arc<DataEntity>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One rule bound to concrete entities, in selector order.
#[derive(Debug, Clone)]
pub struct ExecutionTask {
    pub rule: Arc<Rule>,
    pub entities: Vec<Arc<DataEntity>>,
}

impl ExecutionTask {
    pub fn bindings(&self) -> Vec<EntityKey> {
        self.entities.iter().map(|e| e.key.clone()).collect()
    }
}

/// Builds the ordered task list for one run. Extra-selector fetches are
/// memoised for the lifetime of the scheduler.
pub struct TaskScheduler<'a> {
    store: &'a dyn DataStore,
    fetched: HashMap<EntityKey, Option<Arc<DataEntity>>>,
}

impl<'a> TaskScheduler<'a> {
    pub fn new(store: &'a dyn DataStore) -> Self {
        Self {
            store,
            fetched: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, rules: &[Arc<Rule>], catalog: &EntityCatalog) -> Result<Vec<ExecutionTask>, CoreError> {
        let mut tasks = Vec::new();
        for entry in catalog.entries() {
            for rule in rules {
                if let Some(task) = self.bind(rule, entry)? {
                    tasks.push(task);
                }
            }
        }
        info!(rules = rules.len(), entities = catalog.len(), tasks = tasks.len(), "tasks scheduled");
        Ok(tasks)
    }

    fn bind(&mut self, rule: &Arc<Rule>, entry: &Arc<DataEntity>) -> Result<Option<ExecutionTask>, CoreError> {
        let Some(first) = rule.selectors.first() else {
            return Ok(None);
        };
        if !first.accepts(&entry.key) {
            return Ok(None);
        }
        if !rule.version.matches(&entry.version) {
            debug!(rule = %rule.name, entity = %entry.key, version = %entry.version, spec = %rule.version, "version excluded");
            return Ok(None);
        }

        let mut entities = vec![Arc::clone(entry)];
        for selector in &rule.selectors[1..] {
            // Pinned literals only; enforced when the rule was defined.
            let (EntityPattern::Named(name), Some(occurrence)) = (&selector.pattern, selector.occurrence) else {
                return Ok(None);
            };
            match self.fetch(name, occurrence)? {
                Some(entity) => entities.push(entity),
                None => {
                    debug!(rule = %rule.name, entity = %entry.key, missing = %selector, "additional entity absent");
                    return Ok(None);
                }
            }
        }

        debug!(rule = %rule.name, entity = %entry.key, "task bound");
        Ok(Some(ExecutionTask {
            rule: Arc::clone(rule),
            entities,
        }))
    }

    fn fetch(&mut self, name: &str, occurrence: u32) -> Result<Option<Arc<DataEntity>>, CoreError> {
        let key = EntityKey::new(name, occurrence);
        if let Some(cached) = self.fetched.get(&key) {
            return Ok(cached.clone());
        }
        let entity = self.store.get(name, occurrence)?.map(Arc::new);
        self.fetched.insert(key, entity.clone());
        Ok(entity)
    }
}
