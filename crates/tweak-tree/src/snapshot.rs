//! Immutable snapshots with structural sharing.
//!
//! A [`Snapshot`] mirrors the data of a tracked node at one point in time.
//! Containers are reference counted, so cloning a snapshot is O(1) and two
//! snapshots taken before and after a mutation share every container the
//! mutation did not touch. [`Snapshot::ptr_eq`] is the identity check
//! consumers use to skip work on unchanged branches; `==` is deep equality.
//!
//! The `cow_*` helpers build the next version of a container by cloning only
//! that container (its children are shared), which gives O(depth)
//! allocation per mutation once applied from the mutated node to the root.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Number, Value as JsonValue};
use tweak_tree_pointer::PathSegment;

/// Key under which model data objects record their model type.
pub const MODEL_TYPE_KEY: &str = "$modelType";

pub type SnapshotMap = IndexMap<String, Snapshot>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    Null,
    Bool(bool),
    Number(Number),
    String(Arc<str>),
    Array(Arc<Vec<Snapshot>>),
    Object(Arc<SnapshotMap>),
}

impl Snapshot {
    pub fn array(items: Vec<Snapshot>) -> Self {
        Snapshot::Array(Arc::new(items))
    }

    pub fn object(map: SnapshotMap) -> Self {
        Snapshot::Object(Arc::new(map))
    }

    /// Identity comparison: containers are equal only when they are the same
    /// allocation, primitives compare by value.
    pub fn ptr_eq(&self, other: &Snapshot) -> bool {
        match (self, other) {
            (Snapshot::Array(a), Snapshot::Array(b)) => Arc::ptr_eq(a, b),
            (Snapshot::Object(a), Snapshot::Object(b)) => Arc::ptr_eq(a, b),
            (Snapshot::Array(_), _) | (Snapshot::Object(_), _) => false,
            (_, Snapshot::Array(_)) | (_, Snapshot::Object(_)) => false,
            (a, b) => a == b,
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, Snapshot::Array(_) | Snapshot::Object(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Snapshot::Null => "null",
            Snapshot::Bool(_) => "boolean",
            Snapshot::Number(_) => "number",
            Snapshot::String(_) => "string",
            Snapshot::Array(_) => "array",
            Snapshot::Object(_) => "object",
        }
    }

    pub fn as_array(&self) -> Option<&[Snapshot]> {
        match self {
            Snapshot::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&SnapshotMap> {
        match self {
            Snapshot::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Snapshot::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Snapshot::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Snapshot> {
        self.as_object()?.get(key)
    }

    pub fn at(&self, segment: &PathSegment) -> Option<&Snapshot> {
        match (self, segment) {
            (Snapshot::Object(map), PathSegment::Key(key)) => map.get(key),
            (Snapshot::Object(map), PathSegment::Index(i)) => map.get(&i.to_string()),
            (Snapshot::Array(items), PathSegment::Index(i)) => items.get(*i),
            _ => None,
        }
    }

    pub fn at_path(&self, path: &[PathSegment]) -> Option<&Snapshot> {
        path.iter().try_fold(self, |cur, segment| cur.at(segment))
    }

    /// The `$modelType` of a model snapshot, if any.
    pub fn model_type(&self) -> Option<&str> {
        self.get(MODEL_TYPE_KEY)?.as_str()
    }

    /// Drops every `$modelType` key, producing the pure JSON flavor.
    pub fn without_metadata(&self) -> Snapshot {
        match self {
            Snapshot::Array(items) => {
                Snapshot::array(items.iter().map(Snapshot::without_metadata).collect())
            }
            Snapshot::Object(map) => Snapshot::object(
                map.iter()
                    .filter(|(k, _)| k.as_str() != MODEL_TYPE_KEY)
                    .map(|(k, v)| (k.clone(), v.without_metadata()))
                    .collect(),
            ),
            primitive => primitive.clone(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::from(self)
    }

    // ── Copy-on-write updates ─────────────────────────────────────────────

    /// Next version with `value` stored at `segment`. Object keys keep their
    /// position when overwritten. `None` when the segment does not address
    /// this container.
    pub(crate) fn cow_set(&self, segment: &PathSegment, value: Snapshot) -> Option<Snapshot> {
        match (self, segment) {
            (Snapshot::Object(map), PathSegment::Key(key)) => {
                let mut next = SnapshotMap::clone(map);
                next.insert(key.clone(), value);
                Some(Snapshot::object(next))
            }
            (Snapshot::Array(items), PathSegment::Index(i)) if *i < items.len() => {
                let mut next = Vec::clone(items);
                next[*i] = value;
                Some(Snapshot::array(next))
            }
            _ => None,
        }
    }

    pub(crate) fn cow_remove(&self, key: &str) -> Option<Snapshot> {
        let map = self.as_object()?;
        let mut next = SnapshotMap::clone(map);
        next.shift_remove(key)?;
        Some(Snapshot::object(next))
    }

    /// Replaces `delete_count` items starting at `start` with `items`,
    /// sharing every item outside the range.
    pub(crate) fn cow_splice(
        &self,
        start: usize,
        delete_count: usize,
        items: Vec<Snapshot>,
    ) -> Option<Snapshot> {
        let current = self.as_array()?;
        let end = start.checked_add(delete_count)?;
        if end > current.len() {
            return None;
        }
        let mut next = Vec::with_capacity(current.len() - delete_count + items.len());
        next.extend_from_slice(&current[..start]);
        next.extend(items);
        next.extend_from_slice(&current[end..]);
        Some(Snapshot::array(next))
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

// ── Conversions ───────────────────────────────────────────────────────────

impl From<&JsonValue> for Snapshot {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Snapshot::Null,
            JsonValue::Bool(b) => Snapshot::Bool(*b),
            JsonValue::Number(n) => Snapshot::Number(n.clone()),
            JsonValue::String(s) => Snapshot::String(Arc::from(s.as_str())),
            JsonValue::Array(items) => Snapshot::array(items.iter().map(Snapshot::from).collect()),
            JsonValue::Object(map) => Snapshot::object(
                map.iter().map(|(k, v)| (k.clone(), Snapshot::from(v))).collect(),
            ),
        }
    }
}

impl From<JsonValue> for Snapshot {
    fn from(value: JsonValue) -> Self {
        Snapshot::from(&value)
    }
}

impl From<&Snapshot> for JsonValue {
    fn from(snapshot: &Snapshot) -> Self {
        match snapshot {
            Snapshot::Null => JsonValue::Null,
            Snapshot::Bool(b) => JsonValue::Bool(*b),
            Snapshot::Number(n) => JsonValue::Number(n.clone()),
            Snapshot::String(s) => JsonValue::String(s.to_string()),
            Snapshot::Array(items) => JsonValue::Array(items.iter().map(JsonValue::from).collect()),
            Snapshot::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (k, v) in map.iter() {
                    out.insert(k.clone(), JsonValue::from(v));
                }
                JsonValue::Object(out)
            }
        }
    }
}

impl From<bool> for Snapshot {
    fn from(b: bool) -> Self {
        Snapshot::Bool(b)
    }
}

impl From<i64> for Snapshot {
    fn from(n: i64) -> Self {
        Snapshot::Number(n.into())
    }
}

impl From<i32> for Snapshot {
    fn from(n: i32) -> Self {
        Snapshot::Number(n.into())
    }
}

impl From<usize> for Snapshot {
    fn from(n: usize) -> Self {
        Snapshot::Number(n.into())
    }
}

impl From<f64> for Snapshot {
    /// Non-finite floats have no JSON form and become `Null`.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Snapshot::Number).unwrap_or(Snapshot::Null)
    }
}

impl From<&str> for Snapshot {
    fn from(s: &str) -> Self {
        Snapshot::String(Arc::from(s))
    }
}

impl From<String> for Snapshot {
    fn from(s: String) -> Self {
        Snapshot::String(Arc::from(s))
    }
}
