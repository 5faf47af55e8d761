use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use ids_core::{field_name, index_path, join_path, DataEntity, EntityKey, Node, Value};

use super::ProxyError;

/// One leaf of one bound entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldRef {
    pub entity: EntityKey,
    pub path: String,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity, self.path)
    }
}

/// Leaves read through any handle derived from one root.
#[derive(Debug, Clone, Default)]
pub struct TouchLog(Arc<Mutex<BTreeSet<FieldRef>>>);

impl TouchLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&self, field: FieldRef) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).insert(field);
    }

    pub fn snapshot(&self) -> BTreeSet<FieldRef> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Position inside an entity tree. `trail` runs from the root to the
/// current node and is never empty.
#[derive(Debug, Clone)]
struct Cursor {
    entity: EntityKey,
    log: TouchLog,
    trail: Vec<(String, Arc<Node>)>,
}

impl Cursor {
    fn path(&self) -> &str {
        self.trail.last().map(|(p, _)| p.as_str()).unwrap_or("")
    }

    fn node(&self) -> &Arc<Node> {
        // A cursor is always created with its root in the trail.
        &self.trail[self.trail.len() - 1].1
    }

    fn descend(&self, path: String, node: Arc<Node>) -> Cursor {
        let mut trail = self.trail.clone();
        trail.push((path, node));
        Cursor {
            entity: self.entity.clone(),
            log: self.log.clone(),
            trail,
        }
    }

    fn field_ref(&self) -> FieldRef {
        FieldRef {
            entity: self.entity.clone(),
            path: self.path().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
enum Subject {
    Tree(Cursor),
    Derived(Value),
}

/// Observing handle over a tree node or a value computed from tree nodes.
#[derive(Debug, Clone)]
pub struct Observed {
    subject: Subject,
    provenance: BTreeSet<FieldRef>,
}

impl Observed {
    /// Handle on an entity root, logging reads into `log`.
    pub fn root(entity: &DataEntity, log: TouchLog) -> Self {
        Self {
            subject: Subject::Tree(Cursor {
                entity: entity.key.clone(),
                log,
                trail: vec![(String::new(), Arc::clone(&entity.root))],
            }),
            provenance: BTreeSet::new(),
        }
    }

    /// A computed value remembering which leaves it came from.
    pub fn derived(value: Value, provenance: BTreeSet<FieldRef>) -> Self {
        Self {
            subject: Subject::Derived(value),
            provenance,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self.subject, Subject::Tree(_))
    }

    pub fn entity(&self) -> Option<&EntityKey> {
        match &self.subject {
            Subject::Tree(c) => Some(&c.entity),
            Subject::Derived(_) => None,
        }
    }

    /// Field path inside the entity (`""` for roots and derived values).
    pub fn path(&self) -> &str {
        match &self.subject {
            Subject::Tree(c) => c.path(),
            Subject::Derived(_) => "",
        }
    }

    pub fn field_name(&self) -> &str {
        field_name(self.path())
    }

    pub fn node(&self) -> Option<&Arc<Node>> {
        match &self.subject {
            Subject::Tree(c) => Some(c.node()),
            Subject::Derived(_) => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        match &self.subject {
            Subject::Tree(c) => c.node().is_leaf(),
            Subject::Derived(_) => true,
        }
    }

    /// Leaves this handle stands for: itself for a tree leaf, the inputs
    /// of the computation for a derived value.
    pub fn provenance(&self) -> BTreeSet<FieldRef> {
        match &self.subject {
            Subject::Tree(c) if c.node().is_leaf() => BTreeSet::from([c.field_ref()]),
            _ => self.provenance.clone(),
        }
    }

    // ── Navigation ────────────────────────────────────────────

    pub fn child(&self, name: &str) -> Result<Observed, ProxyError> {
        let cursor = self.cursor()?;
        match cursor.node().as_ref() {
            Node::Structure(_) => {
                let child = cursor
                    .node()
                    .child(name)
                    .ok_or_else(|| ProxyError::MissingField {
                        path: cursor.path().to_string(),
                        name: name.to_string(),
                    })?;
                Ok(Self::at(cursor.descend(join_path(cursor.path(), name), Arc::clone(child))))
            }
            other => Err(ProxyError::NotAStructure {
                path: cursor.path().to_string(),
                kind: other.kind(),
            }),
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.node().is_some_and(|n| n.child(name).is_some())
    }

    /// Element `index` of an array of structures or of an array value.
    /// Negative indices count from the end.
    pub fn index(&self, index: i64) -> Result<Observed, ProxyError> {
        match &self.subject {
            Subject::Tree(cursor) => match cursor.node().as_ref() {
                Node::StructArray(items) => {
                    let i = resolve_index(index, items.len(), cursor.path())?;
                    Ok(Self::at(cursor.descend(index_path(cursor.path(), i), Arc::clone(&items[i]))))
                }
                Node::Leaf(_) => {
                    let value = self.read_value()?;
                    self.element_of(&value, index)
                }
                Node::Structure(_) => Err(ProxyError::NotIndexable {
                    path: cursor.path().to_string(),
                }),
            },
            Subject::Derived(value) => self.element_of(value, index),
        }
    }

    /// Ancestor `levels` steps up (`parent(1)` is the direct parent).
    pub fn parent(&self, levels: usize) -> Result<Observed, ProxyError> {
        let cursor = self.cursor()?;
        if levels >= cursor.trail.len() {
            return Err(ProxyError::NoParent {
                path: cursor.path().to_string(),
                levels,
            });
        }
        let mut up = cursor.clone();
        up.trail.truncate(cursor.trail.len() - levels);
        Ok(Self::at(up))
    }

    /// Direct children: array elements, or structure fields in order.
    pub fn children(&self) -> Result<Vec<Observed>, ProxyError> {
        match &self.subject {
            Subject::Tree(cursor) => match cursor.node().as_ref() {
                Node::StructArray(items) => Ok(items
                    .iter()
                    .enumerate()
                    .map(|(i, n)| Self::at(cursor.descend(index_path(cursor.path(), i), Arc::clone(n))))
                    .collect()),
                Node::Structure(fields) => Ok(fields
                    .iter()
                    .map(|(name, n)| Self::at(cursor.descend(join_path(cursor.path(), name), Arc::clone(n))))
                    .collect()),
                Node::Leaf(_) => {
                    let value = self.read_value()?;
                    self.elements_of(&value)
                }
            },
            Subject::Derived(value) => self.elements_of(value),
        }
    }

    /// Every descendant with its path relative to this handle.
    pub(crate) fn descendants(&self) -> Result<Vec<(String, Observed)>, ProxyError> {
        let cursor = self.cursor()?;
        let mut out = Vec::new();
        collect_descendants(cursor, "", &mut out);
        Ok(out)
    }

    // ── Reads ─────────────────────────────────────────────────

    /// Read the leaf value, logging the touch.
    pub fn read_value(&self) -> Result<Value, ProxyError> {
        match &self.subject {
            Subject::Tree(cursor) => match cursor.node().value() {
                Some(value) => {
                    cursor.log.touch(cursor.field_ref());
                    Ok(value.clone())
                }
                None => Err(ProxyError::NotALeaf {
                    path: cursor.path().to_string(),
                    kind: cursor.node().kind(),
                }),
            },
            Subject::Derived(value) => Ok(value.clone()),
        }
    }

    /// Value together with its provenance.
    pub fn read(&self) -> Result<(Value, BTreeSet<FieldRef>), ProxyError> {
        let value = self.read_value()?;
        Ok((value, self.provenance()))
    }

    pub fn has_value(&self) -> bool {
        match &self.subject {
            Subject::Tree(cursor) => {
                let node = cursor.node();
                if node.is_leaf() {
                    cursor.log.touch(cursor.field_ref());
                }
                node.has_value()
            }
            Subject::Derived(value) => value.has_value(),
        }
    }

    pub fn len(&self) -> Result<usize, ProxyError> {
        match &self.subject {
            Subject::Tree(cursor) if !cursor.node().is_leaf() => Ok(cursor.node().len()),
            _ => Ok(self.read_value()?.len()),
        }
    }

    pub fn is_empty(&self) -> Result<bool, ProxyError> {
        Ok(self.len()? == 0)
    }

    pub fn ndim(&self) -> usize {
        match &self.subject {
            Subject::Tree(cursor) => match cursor.node().as_ref() {
                Node::Leaf(v) => v.ndim(),
                Node::StructArray(_) => 1,
                Node::Structure(_) => 0,
            },
            Subject::Derived(v) => v.ndim(),
        }
    }

    /// Leaves are truthy by value (arrays elementwise), structures when any
    /// descendant holds a value.
    pub fn truthy(&self) -> Result<bool, ProxyError> {
        match &self.subject {
            Subject::Tree(cursor) if !cursor.node().is_leaf() => Ok(cursor.node().has_value()),
            _ => Ok(self.read_value()?.truthy()),
        }
    }

    // ── Internals ─────────────────────────────────────────────

    fn at(cursor: Cursor) -> Self {
        Self {
            subject: Subject::Tree(cursor),
            provenance: BTreeSet::new(),
        }
    }

    fn cursor(&self) -> Result<&Cursor, ProxyError> {
        match &self.subject {
            Subject::Tree(c) => Ok(c),
            Subject::Derived(v) => Err(ProxyError::Detached { path: v.to_string() }),
        }
    }

    fn element_of(&self, value: &Value, index: i64) -> Result<Observed, ProxyError> {
        let items = value.as_array().ok_or_else(|| ProxyError::NotIndexable {
            path: self.describe(),
        })?;
        let i = resolve_index(index, items.len(), &self.describe())?;
        Ok(Self::derived(items[i].clone(), self.provenance()))
    }

    fn elements_of(&self, value: &Value) -> Result<Vec<Observed>, ProxyError> {
        let items = value.as_array().ok_or_else(|| ProxyError::NotIndexable {
            path: self.describe(),
        })?;
        let provenance = self.provenance();
        Ok(items
            .iter()
            .map(|v| Self::derived(v.clone(), provenance.clone()))
            .collect())
    }

    fn describe(&self) -> String {
        match &self.subject {
            Subject::Tree(c) => c.path().to_string(),
            Subject::Derived(v) => v.to_string(),
        }
    }
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subject {
            Subject::Tree(c) if c.path().is_empty() => write!(f, "<{}>", c.entity),
            Subject::Tree(c) => write!(f, "<{}:{}>", c.entity, c.path()),
            Subject::Derived(v) => write!(f, "{v}"),
        }
    }
}

/// Iteration yields [`Observed::children`]; values that cannot be iterated
/// yield nothing.
impl IntoIterator for Observed {
    type Item = Observed;
    type IntoIter = std::vec::IntoIter<Observed>;

    fn into_iter(self) -> Self::IntoIter {
        self.children().unwrap_or_default().into_iter()
    }
}

fn resolve_index(index: i64, len: usize, path: &str) -> Result<usize, ProxyError> {
    let resolved = if index < 0 { len as i64 + index } else { index };
    if resolved < 0 || resolved as usize >= len {
        return Err(ProxyError::IndexOutOfRange {
            path: path.to_string(),
            index,
            len,
        });
    }
    Ok(resolved as usize)
}

fn collect_descendants(cursor: &Cursor, relative: &str, out: &mut Vec<(String, Observed)>) {
    let children: Vec<(String, String, &Arc<Node>)> = match cursor.node().as_ref() {
        Node::Structure(fields) => fields
            .iter()
            .map(|(name, n)| (join_path(cursor.path(), name), join_path(relative, name), n))
            .collect(),
        Node::StructArray(items) => items
            .iter()
            .enumerate()
            .map(|(i, n)| (index_path(cursor.path(), i), index_path(relative, i), n))
            .collect(),
        Node::Leaf(_) => Vec::new(),
    };
    for (path, rel, node) in children {
        let child = cursor.descend(path, Arc::clone(node));
        out.push((rel.clone(), Observed::at(child.clone())));
        collect_descendants(&child, &rel, out);
    }
}
