//! Backing-store contract and the session guard that brackets a run.

mod json;
mod memory;

pub use json::JsonStore;
pub use memory::MemoryStore;

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::{debug, warn};
use url::Url;

use crate::entity::DataEntity;
use crate::error::{CoreError, Result};

/// Read-only access to a collection of entities.
pub trait DataStore {
    /// URI the store was opened from, used in reports.
    fn uri(&self) -> &str;

    /// Entity names present in the store, sorted.
    fn list_entity_names(&self) -> Result<Vec<String>>;

    /// Occurrences stored for one entity name, sorted.
    fn list_occurrences(&self, name: &str) -> Result<Vec<u32>>;

    /// Load one entity; `Ok(None)` when that instance does not exist.
    fn get(&self, name: &str, occurrence: u32) -> Result<Option<DataEntity>>;

    /// Schema field paths (indices stripped) for an entity name, when known.
    fn schema_paths(&self, _name: &str) -> Result<Option<BTreeSet<String>>> {
        Ok(None)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl<T: DataStore + ?Sized> DataStore for std::sync::Arc<T> {
    fn uri(&self) -> &str {
        (**self).uri()
    }

    fn list_entity_names(&self) -> Result<Vec<String>> {
        (**self).list_entity_names()
    }

    fn list_occurrences(&self, name: &str) -> Result<Vec<u32>> {
        (**self).list_occurrences(name)
    }

    fn get(&self, name: &str, occurrence: u32) -> Result<Option<DataEntity>> {
        (**self).get(name, occurrence)
    }

    fn schema_paths(&self, name: &str) -> Result<Option<BTreeSet<String>>> {
        (**self).schema_paths(name)
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}

/// Open a store from a URI: a plain directory path, `file://` or `json://`.
pub fn open_store(uri: &str) -> Result<Box<dyn DataStore>> {
    let path = if uri.contains("://") {
        let url = Url::parse(uri).map_err(|e| CoreError::InvalidUri(format!("{uri}: {e}")))?;
        match url.scheme() {
            "file" => url
                .to_file_path()
                .map_err(|_| CoreError::InvalidUri(format!("{uri}: not a local path")))?,
            "json" => {
                let host = url.host_str().unwrap_or("");
                PathBuf::from(format!("{host}{}", url.path()))
            }
            other => {
                return Err(CoreError::InvalidUri(format!(
                    "{uri}: unsupported scheme '{other}' (expected file:// or json://)"
                )))
            }
        }
    } else {
        PathBuf::from(uri)
    };

    debug!(uri, path = %path.display(), "opening JSON store");
    Ok(Box::new(JsonStore::open_with_uri(path, uri)?))
}

// ── Session ───────────────────────────────────────────────────

/// Scoped ownership of an open store. The store is closed exactly once,
/// either through [`StoreSession::close`] or when the session is dropped.
pub struct StoreSession {
    store: Box<dyn DataStore>,
    closed: bool,
}

impl StoreSession {
    pub fn new(store: Box<dyn DataStore>) -> Self {
        Self { store, closed: false }
    }

    pub fn open(uri: &str) -> Result<Self> {
        Ok(Self::new(open_store(uri)?))
    }

    pub fn store(&self) -> &dyn DataStore {
        self.store.as_ref()
    }

    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.store.close()
    }
}

impl Drop for StoreSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.store.close() {
            warn!(uri = self.store.uri(), error = %e, "failed to close store");
        }
    }
}

#[cfg(test)]
mod tests;
