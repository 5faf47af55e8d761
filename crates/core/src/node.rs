//! Navigable entity trees.
//!
//! Field paths are written `a/b[0]/c`: `/` separates structure fields and
//! `[i]` selects an element of an array of structures. Schema paths are the
//! same with every index removed (`a/b/c`).

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{CoreError, Result};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Ordered named children.
    Structure(IndexMap<String, Arc<Node>>),
    /// Array of structures, addressed by index.
    StructArray(Vec<Arc<Node>>),
    Leaf(Value),
}

impl Node {
    pub fn leaf(value: impl Into<Value>) -> Self {
        Node::Leaf(value.into())
    }

    pub fn structure<K: Into<String>>(fields: impl IntoIterator<Item = (K, Node)>) -> Self {
        Node::Structure(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), Arc::new(v)))
                .collect(),
        )
    }

    pub fn array(items: impl IntoIterator<Item = Node>) -> Self {
        Node::StructArray(items.into_iter().map(Arc::new).collect())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Structure(_) => "structure",
            Node::StructArray(_) => "array of structures",
            Node::Leaf(_) => "leaf",
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn child(&self, name: &str) -> Option<&Arc<Node>> {
        match self {
            Node::Structure(fields) => fields.get(name),
            _ => None,
        }
    }

    pub fn index(&self, i: usize) -> Option<&Arc<Node>> {
        match self {
            Node::StructArray(items) => items.get(i),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Node::Leaf(v) => Some(v),
            _ => None,
        }
    }

    pub fn field_names(&self) -> Vec<&str> {
        match self {
            Node::Structure(fields) => fields.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// A structure has a value when any descendant leaf does.
    pub fn has_value(&self) -> bool {
        match self {
            Node::Leaf(v) => v.has_value(),
            Node::StructArray(items) => !items.is_empty(),
            Node::Structure(fields) => fields.values().any(|n| n.has_value()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Node::Leaf(v) => v.len(),
            Node::StructArray(items) => items.len(),
            Node::Structure(fields) => fields.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build a tree from JSON. Objects become structures, arrays whose
    /// elements are all objects become arrays of structures, everything
    /// else is a leaf.
    pub fn from_json(json: &serde_json::Value) -> Result<Node> {
        from_json_at(json, "")
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Node::Structure(fields) => serde_json::Value::Object(
                fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Node::StructArray(items) => serde_json::Value::Array(items.iter().map(|n| n.to_json()).collect()),
            Node::Leaf(v) => v.to_json(),
        }
    }

    /// Depth-first visit of every node with its field path. The root has
    /// the empty path.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&str, &'a Node)) {
        walk_at(self, "", visit);
    }

    /// Paths of every leaf holding a value.
    pub fn filled_leaf_paths(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.walk(&mut |path, node| {
            if let Node::Leaf(v) = node {
                if v.has_value() {
                    out.insert(path.to_string());
                }
            }
        });
        out
    }
}

fn from_json_at(json: &serde_json::Value, path: &str) -> Result<Node> {
    match json {
        serde_json::Value::Object(map) => {
            let mut fields = IndexMap::with_capacity(map.len());
            for (k, v) in map {
                fields.insert(k.clone(), Arc::new(from_json_at(v, &join_path(path, k))?));
            }
            Ok(Node::Structure(fields))
        }
        serde_json::Value::Array(items) if items.first().is_some_and(|v| v.is_object()) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let item_path = index_path(path, i);
                if !item.is_object() {
                    return Err(CoreError::MalformedTree {
                        path: item_path,
                        reason: "array mixes structures and plain values".into(),
                    });
                }
                out.push(Arc::new(from_json_at(item, &item_path)?));
            }
            Ok(Node::StructArray(out))
        }
        other => Value::from_json(other)
            .map(Node::Leaf)
            .ok_or_else(|| CoreError::MalformedTree {
                path: path.to_string(),
                reason: "nested structures inside a plain array".into(),
            }),
    }
}

fn walk_at<'a>(node: &'a Node, path: &str, visit: &mut dyn FnMut(&str, &'a Node)) {
    visit(path, node);
    match node {
        Node::Structure(fields) => {
            for (name, child) in fields {
                walk_at(child, &join_path(path, name), visit);
            }
        }
        Node::StructArray(items) => {
            for (i, child) in items.iter().enumerate() {
                walk_at(child, &index_path(path, i), visit);
            }
        }
        Node::Leaf(_) => {}
    }
}

// ── Paths ─────────────────────────────────────────────────────

pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

pub fn index_path(parent: &str, i: usize) -> String {
    format!("{parent}[{i}]")
}

/// Remove every `[i]` index from a field path.
pub fn strip_indices(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut depth = 0usize;
    for c in path.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Last named component of a field path (`a/b[2]` → `b`).
pub fn field_name(path: &str) -> &str {
    let last = path.rsplit('/').next().unwrap_or(path);
    last.split('[').next().unwrap_or(last)
}
