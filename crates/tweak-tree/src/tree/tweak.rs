//! Turning raw values into tracked nodes.
//!
//! Values are validated as a whole before anything is allocated or linked,
//! so a rejected value leaves the tree untouched. Objects carrying a string
//! `$modelType` become model instances of the registered type.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tweak_tree_pointer::PathSegment;

use super::{Node, NodeKind, ParentLink, SnapshotCache, Tree, DATA_SEGMENT};
use crate::arena::NodeId;
use crate::error::{Result, TweakError};
use crate::model::ModelType;
use crate::snapshot::{Snapshot, SnapshotMap, MODEL_TYPE_KEY};
use crate::value::{Entry, Value};

/// Where an incoming value is about to be stored.
pub(crate) struct Incoming<'a> {
    /// Container receiving the value; `None` for fresh roots.
    pub target: Option<NodeId>,
    /// Nodes the same change removes from `target`; they may be re-inserted.
    pub releasing: &'a IndexSet<NodeId>,
}

impl Tree {
    /// Converts `value` into a tracked entry. Primitives pass through as
    /// leaves, objects and arrays become fresh detached roots, and an
    /// already tracked node is returned as is.
    pub fn tweak(&mut self, value: impl Into<Value>) -> Result<Entry> {
        let value = value.into();
        if matches!(value, Value::Undefined) {
            return Err(TweakError::UnsupportedValue("undefined"));
        }
        let releasing = IndexSet::new();
        let incoming = Incoming { target: None, releasing: &releasing };
        self.validate_incoming(&incoming, &value, &mut HashSet::new(), false)?;
        if let Value::Node(id) = value {
            return Ok(Entry::Node(id));
        }
        self.tweak_value(value, None)
    }

    /// Like [`Tree::tweak`], for values that must produce a node.
    pub fn tweak_node(&mut self, value: impl Into<Value>) -> Result<NodeId> {
        let value = value.into();
        let kind = value.kind();
        self.tweak(value)?
            .as_node()
            .ok_or(TweakError::UnsupportedValue(kind))
    }

    /// Builds a detached tree from a standard snapshot, instantiating models
    /// for every `$modelType` object.
    pub fn from_snapshot(&mut self, snapshot: &Snapshot) -> Result<Entry> {
        self.tweak(Value::from_snapshot(snapshot))
    }

    /// New detached instance of a registered model type. Missing fields take
    /// their declared defaults.
    pub fn create_model(&mut self, type_name: &str, props: IndexMap<String, Value>) -> Result<NodeId> {
        let mut object = IndexMap::with_capacity(props.len() + 1);
        object.insert(MODEL_TYPE_KEY.to_string(), Value::from(type_name));
        object.extend(props);
        self.tweak_node(Value::Object(object))
    }

    /// Checks a whole incoming snapshot (registered model types, no stray
    /// metadata) before any of it is applied.
    pub(crate) fn validate_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let releasing = IndexSet::new();
        let incoming = Incoming { target: None, releasing: &releasing };
        self.validate_incoming(&incoming, &Value::from_snapshot(snapshot), &mut HashSet::new(), false)
    }

    pub(crate) fn validate_incoming(
        &self,
        incoming: &Incoming<'_>,
        value: &Value,
        seen: &mut HashSet<NodeId>,
        in_array: bool,
    ) -> Result<()> {
        match value {
            Value::Undefined if in_array => Err(TweakError::UndefinedArrayElement),
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => Ok(()),
            Value::Map(_) => Err(TweakError::UnsupportedValue("map")),
            Value::Set(_) => Err(TweakError::UnsupportedValue("set")),
            Value::Array(items) => {
                for item in items {
                    self.validate_incoming(incoming, item, seen, true)?;
                }
                Ok(())
            }
            Value::Object(props) => {
                match props.get(MODEL_TYPE_KEY) {
                    Some(Value::String(name)) if self.models.get(name).is_none() => {
                        return Err(TweakError::UnknownModelType(name.clone()));
                    }
                    Some(Value::String(_) | Value::Undefined) | None => {}
                    Some(_) => return Err(TweakError::UnsupportedValue("$modelType must name a model type")),
                }
                for item in props.values() {
                    self.validate_incoming(incoming, item, seen, false)?;
                }
                Ok(())
            }
            Value::Node(id) => self.validate_attach(incoming, *id, seen),
        }
    }

    fn validate_attach(&self, incoming: &Incoming<'_>, id: NodeId, seen: &mut HashSet<NodeId>) -> Result<()> {
        let node = self.node(id)?;
        if !seen.insert(id) {
            return Err(TweakError::DuplicateNode(id));
        }
        if let Some(target) = incoming.target {
            if target == id || self.is_ancestor_of(id, target)? {
                return Err(TweakError::Cycle(id));
            }
        }
        match &node.parent {
            Some(link) if !incoming.releasing.contains(&id) => Err(TweakError::AlreadyParented {
                node: id,
                segment: link.segment.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Allocates tracked nodes for a validated value and links the result
    /// under `link`.
    pub(crate) fn tweak_value(&mut self, value: Value, link: Option<ParentLink>) -> Result<Entry> {
        if let Some(leaf) = value.primitive_snapshot() {
            return Ok(Entry::Leaf(leaf));
        }
        match value {
            Value::Node(id) => {
                self.set_parent(id, link)?;
                Ok(Entry::Node(id))
            }
            Value::Array(items) => self.alloc_array(items, link).map(Entry::Node),
            Value::Object(mut props) => {
                let model = match props.get(MODEL_TYPE_KEY) {
                    Some(Value::String(name)) => Some(name.clone()),
                    _ => None,
                };
                match model {
                    Some(name) => {
                        let ty = self
                            .models
                            .get(&name)
                            .ok_or(TweakError::UnknownModelType(name))?;
                        props.shift_remove(MODEL_TYPE_KEY);
                        self.alloc_model(ty, props, link).map(Entry::Node)
                    }
                    None => self.alloc_object(props, link, None).map(Entry::Node),
                }
            }
            other => Err(TweakError::UnsupportedValue(other.kind())),
        }
    }

    fn alloc_array(&mut self, items: Vec<Value>, link: Option<ParentLink>) -> Result<NodeId> {
        let id = self.nodes.insert(Node::new(NodeKind::Array(Vec::new()), link));
        let mut entries = Vec::with_capacity(items.len());
        let mut standard = Vec::with_capacity(items.len());
        let mut pure = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let entry = self.tweak_value(item, Some(ParentLink::new(id, PathSegment::Index(index))))?;
            let (s, p) = self.entry_snapshots(&entry)?;
            standard.push(s);
            pure.push(p);
            entries.push(entry);
        }
        let node = self.node_mut(id)?;
        node.kind = NodeKind::Array(entries);
        node.cache = Some(SnapshotCache::new(Snapshot::array(standard), Snapshot::array(pure)));
        Ok(id)
    }

    fn alloc_object(
        &mut self,
        props: IndexMap<String, Value>,
        link: Option<ParentLink>,
        model_type: Option<&str>,
    ) -> Result<NodeId> {
        let id = self.nodes.insert(Node::new(NodeKind::Object(IndexMap::new()), link));
        let mut entries = IndexMap::with_capacity(props.len());
        let mut standard = SnapshotMap::with_capacity(props.len() + 1);
        let mut pure = SnapshotMap::with_capacity(props.len());
        if let Some(name) = model_type {
            standard.insert(MODEL_TYPE_KEY.to_string(), Snapshot::from(name));
        }
        for (key, value) in props {
            if matches!(value, Value::Undefined) {
                continue;
            }
            let entry = self.tweak_value(value, Some(ParentLink::new(id, key.as_str())))?;
            let (s, p) = self.entry_snapshots(&entry)?;
            standard.insert(key.clone(), s);
            pure.insert(key.clone(), p);
            entries.insert(key, entry);
        }
        let node = self.node_mut(id)?;
        node.kind = NodeKind::Object(entries);
        node.cache = Some(SnapshotCache::new(Snapshot::object(standard), Snapshot::object(pure)));
        Ok(id)
    }

    fn alloc_model(
        &mut self,
        ty: Arc<ModelType>,
        mut props: IndexMap<String, Value>,
        link: Option<ParentLink>,
    ) -> Result<NodeId> {
        for (field, default) in ty.defaults() {
            let missing = props.get(field).map_or(true, |v| matches!(v, Value::Undefined));
            if missing {
                props.insert(field.clone(), Value::from_snapshot(default));
            }
        }
        let data = self.alloc_object(props, None, Some(ty.name()))?;
        log::trace!("instantiating model {:?} with data {data:?}", ty.name());
        let model = self.nodes.insert(Node::new(NodeKind::Model { ty, data }, link));
        self.set_parent(data, Some(ParentLink::new(model, DATA_SEGMENT)))?;
        Ok(model)
    }
}
