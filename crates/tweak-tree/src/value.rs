//! Values written into a tree and entries read back out of it.

use indexmap::IndexMap;
use serde_json::Number;

use crate::arena::NodeId;
use crate::snapshot::Snapshot;

/// A raw value handed to the tree.
///
/// `Map` and `Set` model keyed collections a caller may try to store; they
/// have no plain snapshot form and are always rejected. `Undefined` deletes
/// an object key and is rejected inside arrays.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Map(Vec<(Value, Value)>),
    Set(Vec<Value>),
    /// An already tracked node.
    Node(NodeId),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Node(_) => "node",
        }
    }

    /// The leaf snapshot for primitive values.
    pub(crate) fn primitive_snapshot(&self) -> Option<Snapshot> {
        match self {
            Value::Null => Some(Snapshot::Null),
            Value::Bool(b) => Some(Snapshot::Bool(*b)),
            Value::Number(n) => Some(Snapshot::Number(n.clone())),
            Value::String(s) => Some(Snapshot::from(s.as_str())),
            _ => None,
        }
    }

    /// Builds a raw value from a snapshot, metadata keys included.
    pub fn from_snapshot(snapshot: &Snapshot) -> Value {
        match snapshot {
            Snapshot::Null => Value::Null,
            Snapshot::Bool(b) => Value::Bool(*b),
            Snapshot::Number(n) => Value::Number(n.clone()),
            Snapshot::String(s) => Value::String(s.to_string()),
            Snapshot::Array(items) => Value::Array(items.iter().map(Value::from_snapshot).collect()),
            Snapshot::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_snapshot(v)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_snapshot(&Snapshot::from(&json))
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Node(id)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// What a tracked container holds in one slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// A primitive, stored as its own snapshot.
    Leaf(Snapshot),
    /// A tracked child node.
    Node(NodeId),
}

impl Entry {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Entry::Node(id) => Some(*id),
            Entry::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Snapshot> {
        match self {
            Entry::Leaf(s) => Some(s),
            Entry::Node(_) => None,
        }
    }
}

impl From<Entry> for Value {
    fn from(entry: Entry) -> Self {
        match entry {
            Entry::Node(id) => Value::Node(id),
            Entry::Leaf(s) => Value::from_snapshot(&s),
        }
    }
}
