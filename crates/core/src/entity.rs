use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::node::Node;

/// Identity of one concrete record: entity name plus occurrence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub name: String,
    pub occurrence: u32,
}

impl EntityKey {
    pub fn new(name: impl Into<String>, occurrence: u32) -> Self {
        Self {
            name: name.into(),
            occurrence,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.occurrence)
    }
}

/// A record loaded from a backing store. The tree is shared and never
/// mutated once loaded.
#[derive(Debug, Clone)]
pub struct DataEntity {
    pub key: EntityKey,
    pub version: String,
    pub root: Arc<Node>,
}

impl DataEntity {
    pub fn new(name: impl Into<String>, occurrence: u32, version: impl Into<String>, root: Node) -> Self {
        Self {
            key: EntityKey::new(name, occurrence),
            version: version.into(),
            root: Arc::new(root),
        }
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn occurrence(&self) -> u32 {
        self.key.occurrence
    }
}
