use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::entity::DataEntity;
use crate::error::{CoreError, Result};
use crate::node::Node;

use super::DataStore;

const SCHEMA_FILE: &str = "schema.json";

/// On-disk form of one entity occurrence.
#[derive(Debug, Serialize, Deserialize)]
struct EntityFile {
    #[serde(default)]
    version: String,
    data: serde_json::Value,
}

/// Directory-backed store: `<root>/<entity>/<occurrence>.json`, with an
/// optional `<root>/<entity>/schema.json` listing the entity's schema paths.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
    uri: String,
}

impl JsonStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let uri = root.display().to_string();
        Self::open_with_uri(root, &uri)
    }

    pub(crate) fn open_with_uri(root: PathBuf, uri: &str) -> Result<Self> {
        if !root.is_dir() {
            return Err(CoreError::StoreNotFound(root.display().to_string()));
        }
        Ok(Self {
            root,
            uri: uri.to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entity_path(&self, name: &str, occurrence: u32) -> PathBuf {
        self.root.join(name).join(format!("{occurrence}.json"))
    }

    /// Write one entity to the store, creating its directory as needed.
    pub fn write(&self, entity: &DataEntity) -> Result<()> {
        let dir = self.root.join(entity.name());
        fs::create_dir_all(&dir)?;
        let file = EntityFile {
            version: entity.version.clone(),
            data: entity.root.to_json(),
        };
        let path = self.entity_path(entity.name(), entity.occurrence());
        fs::write(&path, serde_json::to_string_pretty(&file)?)?;
        debug!(path = %path.display(), "wrote entity");
        Ok(())
    }

    /// Write the schema path list for an entity name.
    pub fn write_schema<'a>(&self, name: &str, paths: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let dir = self.root.join(name);
        fs::create_dir_all(&dir)?;
        let paths: Vec<&str> = paths.into_iter().collect();
        fs::write(dir.join(SCHEMA_FILE), serde_json::to_string_pretty(&paths)?)?;
        Ok(())
    }
}

impl DataStore for JsonStore {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn list_entity_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    fn list_occurrences(&self, name: &str) -> Result<Vec<u32>> {
        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut occurrences = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match stem.parse::<u32>() {
                Ok(occ) => occurrences.push(occ),
                Err(_) if stem == "schema" => {}
                Err(_) => warn!(path = %path.display(), "ignoring file that is not an occurrence"),
            }
        }
        occurrences.sort_unstable();
        Ok(occurrences)
    }

    fn get(&self, name: &str, occurrence: u32) -> Result<Option<DataEntity>> {
        let path = self.entity_path(name, occurrence);
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let file: EntityFile = serde_json::from_str(&content)?;
        if !file.data.is_object() {
            return Err(CoreError::MalformedEntity {
                name: name.to_string(),
                occurrence,
                reason: "'data' must be an object".into(),
            });
        }
        let root = Node::from_json(&file.data).map_err(|e| CoreError::MalformedEntity {
            name: name.to_string(),
            occurrence,
            reason: e.to_string(),
        })?;
        Ok(Some(DataEntity::new(name, occurrence, file.version, root)))
    }

    fn schema_paths(&self, name: &str) -> Result<Option<BTreeSet<String>>> {
        let path = self.root.join(name).join(SCHEMA_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let paths: Vec<String> = serde_json::from_str(&fs::read_to_string(&path)?)?;
        Ok(Some(paths.into_iter().collect()))
    }
}
