//! The tracked tree.
//!
//! # Overview
//!
//! A [`Tree`] owns every tracked node in a generational arena and hands out
//! [`NodeId`] handles. Nodes are plain objects, arrays, or model instances.
//! A model instance owns exactly one data object (reachable through
//! [`Tree::model_data`]) and shares that object's snapshot.
//!
//! Every structural mutation goes through one pipeline:
//!
//! 1. write gate ([`Tree::unprotected`] or protection disabled),
//! 2. validation of the pending change (nothing is touched on failure),
//! 3. commit: replaced-out children are detached, inserted values tweaked,
//! 4. copy-on-write snapshot update, propagated towards the root,
//! 5. patch generation at the mutated node, bubbled to every ancestor.
//!
//! Listener closures only receive data, never the tree, so they cannot
//! re-enter it.

mod apply;
mod cache;
mod emit;
mod intercept;
mod registry;
mod tweak;

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tweak_tree_pointer::PathSegment;

pub use registry::{ParentChange, RootPath};

use crate::arena::{Arena, NodeId};
use crate::config::TreeConfig;
use crate::error::{Result, TweakError};
use crate::model::{ModelRegistry, ModelType};
use crate::patch::Patch;
use crate::snapshot::Snapshot;
use crate::value::{Entry, Value};

/// Segment under which a model holds its data object.
pub const DATA_SEGMENT: &str = "$";

pub type PatchListener = Box<dyn FnMut(&[Patch], &[Patch])>;
pub type GlobalPatchListener = Box<dyn FnMut(NodeId, &[Patch], &[Patch])>;
/// Called with `(new, previous)`.
pub type SnapshotListener = Box<dyn FnMut(&Snapshot, &Snapshot)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Where a node lives: its parent and the segment under that parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    pub parent: NodeId,
    pub segment: PathSegment,
}

impl ParentLink {
    pub fn new(parent: NodeId, segment: impl Into<PathSegment>) -> Self {
        Self {
            parent,
            segment: segment.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Object,
    Array,
    Model,
}

pub(crate) enum NodeKind {
    Object(IndexMap<String, Entry>),
    Array(Vec<Entry>),
    Model { ty: Arc<ModelType>, data: NodeId },
}

pub(crate) struct SnapshotCache {
    standard: Snapshot,
    pure: Snapshot,
    version: u64,
}

pub(crate) struct Node {
    kind: NodeKind,
    parent: Option<ParentLink>,
    /// `None` for models, which read their data object's entry.
    cache: Option<SnapshotCache>,
    patch_listeners: BTreeMap<ListenerId, PatchListener>,
    snapshot_listeners: BTreeMap<ListenerId, SnapshotListener>,
}

impl Node {
    fn new(kind: NodeKind, parent: Option<ParentLink>) -> Self {
        Self {
            kind,
            parent,
            cache: None,
            patch_listeners: BTreeMap::new(),
            snapshot_listeners: BTreeMap::new(),
        }
    }
}

/// Tracked object/array/model tree with snapshots and patches.
///
/// ```
/// use serde_json::json;
/// use tweak_tree::{Tree, Value};
///
/// let mut tree = Tree::new();
/// let root = tree.tweak_node(Value::from(json!({"x": 5, "child": {"y": 10}}))).unwrap();
/// let child = tree.get(root, "child").unwrap().and_then(|e| e.as_node()).unwrap();
///
/// let before = tree.get_snapshot(root).unwrap();
/// tree.unprotected(|t| t.set(child, "y", 11)).unwrap();
/// let after = tree.get_snapshot(root).unwrap();
///
/// assert_eq!(after.to_json(), json!({"x": 5, "child": {"y": 11}}));
/// assert_eq!(before.to_json(), json!({"x": 5, "child": {"y": 10}}));
/// ```
pub struct Tree {
    nodes: Arena<Node>,
    models: ModelRegistry,
    config: TreeConfig,
    write_depth: usize,
    batch_depth: usize,
    /// Node -> snapshot before the current batch, for snapshot listeners.
    pending_snapshots: IndexMap<NodeId, Snapshot>,
    next_listener_id: u64,
    global_listeners: BTreeMap<ListenerId, GlobalPatchListener>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            nodes: Arena::default(),
            models: ModelRegistry::default(),
            config,
            write_depth: 0,
            batch_depth: 0,
            pending_snapshots: IndexMap::new(),
            next_listener_id: 1,
            global_listeners: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn register_model(&mut self, ty: ModelType) -> Arc<ModelType> {
        self.models.register(ty)
    }

    pub fn model_type_named(&self, name: &str) -> Option<Arc<ModelType>> {
        self.models.get(name)
    }

    /// Number of live tracked nodes (model instances count their data
    /// object separately).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_tracked(&self, node: NodeId) -> bool {
        self.nodes.contains(node)
    }

    // ── Write scope and batching ──────────────────────────────────────────

    /// Runs `f` with structural mutation authorized. Nestable; also a batch.
    pub fn unprotected<R>(&mut self, f: impl FnOnce(&mut Tree) -> R) -> R {
        self.write_depth += 1;
        let out = self.batch(f);
        self.write_depth -= 1;
        out
    }

    pub fn is_write_authorized(&self) -> bool {
        !self.config.protected || self.write_depth > 0
    }

    pub fn set_protection(&mut self, protected: bool) {
        self.config.protected = protected;
    }

    /// Runs `f` with snapshot listener notifications coalesced until the
    /// outermost batch ends. Patch listeners are still called per change.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Tree) -> R) -> R {
        self.batch_depth += 1;
        let out = f(self);
        self.batch_depth -= 1;
        if self.batch_depth == 0 {
            self.flush_snapshot_listeners();
        }
        out
    }

    fn check_write(&self) -> Result<()> {
        if self.is_write_authorized() {
            Ok(())
        } else {
            Err(TweakError::ProtectionViolation)
        }
    }

    // ── Node access ───────────────────────────────────────────────────────

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id).ok_or(TweakError::StaleNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id).ok_or(TweakError::StaleNode(id))
    }

    /// The node holding the data of `id`: the data object for models, the
    /// node itself otherwise.
    pub(crate) fn container_of(&self, id: NodeId) -> Result<NodeId> {
        match &self.node(id)?.kind {
            NodeKind::Model { data, .. } => Ok(*data),
            _ => Ok(id),
        }
    }

    pub(crate) fn object_entries(&self, id: NodeId) -> Result<&IndexMap<String, Entry>> {
        match &self.node(id)?.kind {
            NodeKind::Object(entries) => Ok(entries),
            _ => Err(TweakError::NotAnObject(id)),
        }
    }

    pub(crate) fn object_entries_mut(&mut self, id: NodeId) -> Result<&mut IndexMap<String, Entry>> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Object(entries) => Ok(entries),
            _ => Err(TweakError::NotAnObject(id)),
        }
    }

    pub(crate) fn array_entries(&self, id: NodeId) -> Result<&Vec<Entry>> {
        match &self.node(id)?.kind {
            NodeKind::Array(entries) => Ok(entries),
            _ => Err(TweakError::NotAnArray(id)),
        }
    }

    pub(crate) fn array_entries_mut(&mut self, id: NodeId) -> Result<&mut Vec<Entry>> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Array(entries) => Ok(entries),
            _ => Err(TweakError::NotAnArray(id)),
        }
    }

    pub fn kind(&self, node: NodeId) -> Result<NodeType> {
        Ok(match &self.node(node)?.kind {
            NodeKind::Object(_) => NodeType::Object,
            NodeKind::Array(_) => NodeType::Array,
            NodeKind::Model { .. } => NodeType::Model,
        })
    }

    pub fn model_type(&self, node: NodeId) -> Result<Option<Arc<ModelType>>> {
        match &self.node(node)?.kind {
            NodeKind::Model { ty, .. } => Ok(Some(ty.clone())),
            _ => Ok(None),
        }
    }

    pub fn model_data(&self, model: NodeId) -> Result<NodeId> {
        match &self.node(model)?.kind {
            NodeKind::Model { data, .. } => Ok(*data),
            _ => Err(TweakError::NotAnObject(model)),
        }
    }

    /// Property `key` of an object or model.
    pub fn get(&self, node: NodeId, key: &str) -> Result<Option<Entry>> {
        let container = self.container_of(node)?;
        Ok(self.object_entries(container)?.get(key).cloned())
    }

    pub fn get_index(&self, node: NodeId, index: usize) -> Result<Option<Entry>> {
        Ok(self.array_entries(node)?.get(index).cloned())
    }

    /// Item count of an array, property count of an object or model.
    pub fn len(&self, node: NodeId) -> Result<usize> {
        let container = self.container_of(node)?;
        match &self.node(container)?.kind {
            NodeKind::Object(entries) => Ok(entries.len()),
            NodeKind::Array(entries) => Ok(entries.len()),
            NodeKind::Model { .. } => Err(TweakError::NotAnObject(container)),
        }
    }

    pub fn is_empty(&self, node: NodeId) -> Result<bool> {
        Ok(self.len(node)? == 0)
    }

    pub fn keys(&self, node: NodeId) -> Result<Vec<String>> {
        let container = self.container_of(node)?;
        Ok(self.object_entries(container)?.keys().cloned().collect())
    }

    /// Tracked children in slot order.
    pub fn children(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let container = self.container_of(node)?;
        Ok(match &self.node(container)?.kind {
            NodeKind::Object(entries) => entries.values().filter_map(Entry::as_node).collect(),
            NodeKind::Array(entries) => entries.iter().filter_map(Entry::as_node).collect(),
            NodeKind::Model { .. } => Vec::new(),
        })
    }

    // ── Mutations ─────────────────────────────────────────────────────────

    /// Sets property `key`. `Value::Undefined` deletes it.
    pub fn set(&mut self, node: NodeId, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.batch(|t| t.commit_set(node, key.to_string(), value))
    }

    /// Deletes property `key`, returning what it held. The removed node, if
    /// any, becomes a detached root.
    pub fn delete(&mut self, node: NodeId, key: &str) -> Result<Option<Entry>> {
        self.batch(|t| t.commit_delete(node, key.to_string()))
    }

    pub fn set_index(&mut self, node: NodeId, index: usize, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.batch(|t| t.commit_set_index(node, index, value))
    }

    /// Removes `delete_count` items at `start` (clamped to the array end) and
    /// inserts `items` there. Returns the removed entries.
    pub fn splice(
        &mut self,
        node: NodeId,
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Result<Vec<Entry>> {
        self.batch(|t| t.commit_splice(node, start, delete_count, items))
    }

    pub fn push(&mut self, node: NodeId, value: impl Into<Value>) -> Result<()> {
        let len = self.array_entries(node)?.len();
        self.splice(node, len, 0, vec![value.into()]).map(|_| ())
    }

    pub fn insert(&mut self, node: NodeId, index: usize, value: impl Into<Value>) -> Result<()> {
        self.splice(node, index, 0, vec![value.into()]).map(|_| ())
    }

    pub fn remove_index(&mut self, node: NodeId, index: usize) -> Result<Entry> {
        let len = self.array_entries(node)?.len();
        if index >= len {
            return Err(TweakError::IndexOutOfBounds { index, len });
        }
        let mut removed = self.splice(node, index, 1, Vec::new())?;
        removed.pop().ok_or(TweakError::IndexOutOfBounds { index, len })
    }

    // ── Listeners ─────────────────────────────────────────────────────────

    fn next_listener(&mut self) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id = self.next_listener_id.saturating_add(1);
        id
    }

    /// Subscribes to patches produced at or below `node`, with paths
    /// relative to `node`.
    pub fn on_patches<F>(&mut self, node: NodeId, listener: F) -> Result<ListenerId>
    where
        F: FnMut(&[Patch], &[Patch]) + 'static,
    {
        self.node(node)?;
        let id = self.next_listener();
        self.node_mut(node)?.patch_listeners.insert(id, Box::new(listener));
        Ok(id)
    }

    pub fn off_patches(&mut self, node: NodeId, listener: ListenerId) -> bool {
        self.nodes
            .get_mut(node)
            .is_some_and(|n| n.patch_listeners.remove(&listener).is_some())
    }

    /// Subscribes to every change in the tree. Called once per change with
    /// the topmost ancestor and patches relative to it.
    pub fn on_global_patches<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(NodeId, &[Patch], &[Patch]) + 'static,
    {
        let id = self.next_listener();
        self.global_listeners.insert(id, Box::new(listener));
        id
    }

    pub fn off_global_patches(&mut self, listener: ListenerId) -> bool {
        self.global_listeners.remove(&listener).is_some()
    }

    /// Subscribes to changes of `node`'s snapshot reference.
    pub fn on_snapshot<F>(&mut self, node: NodeId, listener: F) -> Result<ListenerId>
    where
        F: FnMut(&Snapshot, &Snapshot) + 'static,
    {
        self.node(node)?;
        let id = self.next_listener();
        self.node_mut(node)?.snapshot_listeners.insert(id, Box::new(listener));
        Ok(id)
    }

    pub fn off_snapshot(&mut self, node: NodeId, listener: ListenerId) -> bool {
        self.nodes
            .get_mut(node)
            .is_some_and(|n| n.snapshot_listeners.remove(&listener).is_some())
    }
}
