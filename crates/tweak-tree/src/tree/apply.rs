//! Reconciling snapshot application and tree-level patch application.
//!
//! Applying a snapshot keeps every existing node that can absorb its part of
//! the incoming snapshot and only builds fresh subtrees where it cannot:
//!
//! - primitives are written as leaves,
//! - a model is updated in place when the incoming object names the same
//!   model type and, if the type declares an id field, the same id,
//! - a plain object is updated in place by a plain incoming object,
//! - an array is updated in place by an incoming array,
//! - anything else is replaced by a new subtree.
//!
//! Array items pair positionally by default; see
//! [`ArrayReconciliation`](crate::config::ArrayReconciliation).

use std::collections::HashSet;

use tweak_tree_pointer::PathSegment;

use super::intercept::value_matches;
use super::{NodeKind, NodeType, Tree};
use crate::arena::NodeId;
use crate::config::ArrayReconciliation;
use crate::error::{Result, TweakError};
use crate::patch::apply::length_of;
use crate::patch::{Patch, PatchOp, LENGTH_KEY};
use crate::snapshot::{Snapshot, SnapshotMap, MODEL_TYPE_KEY};
use crate::value::{Entry, Value};

impl Tree {
    /// Brings `node` to `snapshot` with the minimal set of changes. Runs in
    /// its own write scope and batch. The whole snapshot is validated first;
    /// a rejected snapshot changes nothing and emits no patches.
    pub fn apply_snapshot(&mut self, node: NodeId, snapshot: &Snapshot) -> Result<()> {
        self.node(node)?;
        self.validate_snapshot(snapshot)?;
        self.unprotected(|t| t.reconcile_node(node, snapshot))
    }

    /// Applies `patches` below `node`, from last to first when `reverse` is
    /// set. Runs in its own write scope and batch. Values are applied through
    /// the reconciler, so replaced models with a matching id keep their
    /// identity.
    ///
    /// The list is replayed against the current snapshot first, so a patch
    /// that cannot apply rejects the whole list before anything changes.
    pub fn apply_patches(&mut self, node: NodeId, patches: &[Patch], reverse: bool) -> Result<()> {
        let current = self.get_snapshot(node)?;
        for patch in patches {
            if patch.path.last().is_some_and(|s| s.token() == MODEL_TYPE_KEY) {
                return Err(TweakError::InvalidPatch(format!("{patch} targets a reserved key")));
            }
            if let Some(value) = &patch.value {
                self.validate_snapshot(value)?;
            }
        }
        crate::patch::apply_patches(&current, patches, reverse)?;
        self.unprotected(|t| {
            if reverse {
                patches.iter().rev().try_for_each(|p| t.apply_patch_at(node, p))
            } else {
                patches.iter().try_for_each(|p| t.apply_patch_at(node, p))
            }
        })
    }

    fn reconcile_node(&mut self, node: NodeId, snapshot: &Snapshot) -> Result<()> {
        if self.get_snapshot(node)?.ptr_eq(snapshot) {
            return Ok(());
        }
        let found = snapshot.model_type().unwrap_or(snapshot.kind());
        match self.kind(node)? {
            NodeType::Model => {
                let ty = self.model_type(node)?.ok_or(TweakError::NotAnObject(node))?;
                let data = self.model_data(node)?;
                if snapshot.model_type() != Some(ty.name()) {
                    return Err(TweakError::SnapshotMismatch(format!(
                        "expected a {:?} model snapshot, got {found}",
                        ty.name()
                    )));
                }
                if ty.id_field().is_some() && ty.id_of(&self.get_snapshot(data)?) != ty.id_of(snapshot) {
                    return Err(TweakError::SnapshotMismatch(format!("{:?} model id differs", ty.name())));
                }
                match snapshot.as_object() {
                    Some(map) => self.reconcile_object(data, map),
                    None => Err(TweakError::SnapshotMismatch(found.into())),
                }
            }
            NodeType::Object => {
                let accepted = match snapshot.model_type() {
                    None => true,
                    Some(name) => self.data_owner_type(node)?.as_deref() == Some(name),
                };
                match snapshot {
                    Snapshot::Object(map) if accepted => self.reconcile_object(node, map),
                    _ => Err(TweakError::SnapshotMismatch(format!("cannot apply {found} to a plain object"))),
                }
            }
            NodeType::Array => match snapshot.as_array() {
                Some(items) => self.reconcile_array(node, items),
                None => Err(TweakError::SnapshotMismatch(format!("cannot apply {found} to an array"))),
            },
        }
    }

    /// Model type name of the model owning `node`, when `node` is its data
    /// object.
    fn data_owner_type(&self, node: NodeId) -> Result<Option<String>> {
        if !self.is_model_data(node) {
            return Ok(None);
        }
        let Some(link) = self.node(node)?.parent.clone() else {
            return Ok(None);
        };
        Ok(self.model_type(link.parent)?.map(|ty| ty.name().to_string()))
    }

    fn can_reconcile(&self, node: NodeId, incoming: &Snapshot) -> Result<bool> {
        Ok(match (&self.node(node)?.kind, incoming) {
            (NodeKind::Model { ty, data }, Snapshot::Object(_)) => {
                incoming.model_type() == Some(ty.name())
                    && match ty.id_field() {
                        None => true,
                        Some(_) => ty.id_of(&self.get_snapshot(*data)?) == ty.id_of(incoming),
                    }
            }
            (NodeKind::Object(_), Snapshot::Object(_)) => incoming.model_type().is_none(),
            (NodeKind::Array(_), Snapshot::Array(_)) => true,
            _ => false,
        })
    }

    /// The value to store for `incoming` in a slot currently holding
    /// `existing`.
    fn reconcile_entry(&mut self, existing: Option<&Entry>, incoming: &Snapshot) -> Result<Value> {
        if incoming.is_primitive() {
            return Ok(Value::from_snapshot(incoming));
        }
        if let Some(Entry::Node(id)) = existing {
            if self.can_reconcile(*id, incoming)? {
                self.reconcile_node(*id, incoming)?;
                return Ok(Value::Node(*id));
            }
            log::debug!("{id:?} cannot absorb incoming {}, replacing", incoming.kind());
        }
        Ok(Value::from_snapshot(incoming))
    }

    fn reconcile_object(&mut self, object: NodeId, incoming: &SnapshotMap) -> Result<()> {
        let stale: Vec<String> = self
            .object_entries(object)?
            .keys()
            .filter(|k| !incoming.contains_key(k.as_str()))
            .cloned()
            .collect();
        for key in stale {
            self.commit_delete(object, key)?;
        }
        for (key, value) in incoming {
            if key == MODEL_TYPE_KEY && self.is_model_data(object) {
                continue;
            }
            let existing = self.object_entries(object)?.get(key).cloned();
            let next = self.reconcile_entry(existing.as_ref(), value)?;
            self.commit_set(object, key.clone(), next)?;
        }
        Ok(())
    }

    fn reconcile_array(&mut self, array: NodeId, incoming: &[Snapshot]) -> Result<()> {
        let current = self.array_entries(array)?.clone();
        let mut claimed = vec![None; incoming.len()];
        if self.config.array_reconciliation == ArrayReconciliation::ById {
            let mut used = HashSet::new();
            for (i, item) in incoming.iter().enumerate() {
                if let Some(j) = self.find_by_id(&current, item, &used)? {
                    used.insert(j);
                    claimed[i] = Some(j);
                }
            }
        }
        let taken: HashSet<usize> = claimed.iter().flatten().copied().collect();

        let mut next = Vec::with_capacity(incoming.len());
        for (i, item) in incoming.iter().enumerate() {
            let existing = match claimed[i] {
                Some(j) => current.get(j),
                None if !taken.contains(&i) => current.get(i),
                None => None,
            };
            next.push(self.reconcile_entry(existing, item)?);
        }

        let unchanged =
            next.len() == current.len() && next.iter().zip(&current).all(|(v, e)| value_matches(v, e));
        if unchanged {
            return Ok(());
        }
        self.commit_splice(array, 0, current.len(), next).map(|_| ())
    }

    /// Index of an unused model item of the same type and id as `item`.
    fn find_by_id(&self, current: &[Entry], item: &Snapshot, used: &HashSet<usize>) -> Result<Option<usize>> {
        let Some(type_name) = item.model_type() else {
            return Ok(None);
        };
        let Some(ty) = self.models.get(type_name) else {
            return Ok(None);
        };
        let Some(id) = ty.id_of(item) else {
            return Ok(None);
        };
        for (j, entry) in current.iter().enumerate() {
            let Entry::Node(node) = entry else { continue };
            if used.contains(&j) {
                continue;
            }
            if let NodeKind::Model { ty: existing, data } = &self.node(*node)?.kind {
                if existing.name() == type_name && ty.id_of(&self.get_snapshot(*data)?) == Some(id) {
                    return Ok(Some(j));
                }
            }
        }
        Ok(None)
    }

    fn resolve_container(&self, node: NodeId, path: &[PathSegment]) -> Result<NodeId> {
        let mut current = node;
        for (depth, segment) in path.iter().enumerate() {
            match self.child_entry(current, segment)? {
                Some(Entry::Node(id)) => current = id,
                _ => return Err(TweakError::PathNotFound(path[..=depth].to_vec())),
            }
        }
        self.container_of(current)
    }

    fn apply_patch_at(&mut self, node: NodeId, patch: &Patch) -> Result<()> {
        log::trace!("applying {patch} at {node:?}");
        let Some((last, parents)) = patch.path.split_last() else {
            return match (&patch.op, &patch.value) {
                (PatchOp::Remove, _) => Err(TweakError::InvalidPatch("cannot remove the root".into())),
                (_, Some(value)) => self.reconcile_node(node, value),
                (_, None) => Err(TweakError::InvalidPatch(format!("{} without a value", patch.op.as_str()))),
            };
        };
        let target = self.resolve_container(node, parents)?;
        let value = || {
            patch
                .value
                .as_ref()
                .ok_or_else(|| TweakError::InvalidPatch(format!("{} without a value", patch.op.as_str())))
        };
        match self.kind(target)? {
            NodeType::Object => {
                let key = last.token().into_owned();
                match patch.op {
                    PatchOp::Add | PatchOp::Replace => {
                        let existing = self.object_entries(target)?.get(&key).cloned();
                        let next = self.reconcile_entry(existing.as_ref(), value()?)?;
                        self.commit_set(target, key, next)
                    }
                    PatchOp::Remove => match self.commit_delete(target, key)? {
                        Some(_) => Ok(()),
                        None => Err(TweakError::PathNotFound(patch.path.clone())),
                    },
                }
            }
            NodeType::Array => {
                let len = self.array_entries(target)?.len();
                match (patch.op, last) {
                    (PatchOp::Add, PathSegment::Index(i)) => {
                        if *i > len {
                            return Err(TweakError::IndexOutOfBounds { index: *i, len });
                        }
                        let item = Value::from_snapshot(value()?);
                        self.commit_splice(target, *i, 0, vec![item]).map(|_| ())
                    }
                    (PatchOp::Add, PathSegment::Key(k)) if k == "-" => {
                        let item = Value::from_snapshot(value()?);
                        self.commit_splice(target, len, 0, vec![item]).map(|_| ())
                    }
                    (PatchOp::Remove, PathSegment::Index(i)) => {
                        if *i >= len {
                            return Err(TweakError::IndexOutOfBounds { index: *i, len });
                        }
                        self.commit_splice(target, *i, 1, Vec::new()).map(|_| ())
                    }
                    (PatchOp::Replace, PathSegment::Index(i)) => {
                        let Some(existing) = self.array_entries(target)?.get(*i).cloned() else {
                            return Err(TweakError::IndexOutOfBounds { index: *i, len });
                        };
                        let next = self.reconcile_entry(Some(&existing), value()?)?;
                        self.commit_set_index(target, *i, next)
                    }
                    (PatchOp::Replace, PathSegment::Key(k)) if k == LENGTH_KEY => {
                        let new_len = length_of(value()?)?;
                        if new_len > len {
                            return Err(TweakError::InvalidPatch(format!(
                                "cannot grow an array of length {len} to {new_len} via length"
                            )));
                        }
                        self.commit_splice(target, new_len, len - new_len, Vec::new()).map(|_| ())
                    }
                    _ => Err(TweakError::InvalidPatch(format!("{patch} does not address an array item"))),
                }
            }
            NodeType::Model => Err(TweakError::PathNotFound(patch.path.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::TweakError;
    use crate::model::ModelType;
    use crate::snapshot::Snapshot;
    use crate::tree::Tree;
    use crate::value::Value;
    use serde_json::json;

    #[test]
    fn applying_the_current_snapshot_is_silent() {
        let mut tree = Tree::new();
        let root = tree.tweak_node(Value::from(json!({"a": [1, {"b": 2}]}))).unwrap();
        let count = std::rc::Rc::new(std::cell::Cell::new(0));
        let sink = count.clone();
        tree.on_patches(root, move |_, _| sink.set(sink.get() + 1)).unwrap();

        let same = tree.get_snapshot(root).unwrap();
        tree.apply_snapshot(root, &same).unwrap();
        let equal = Snapshot::from(json!({"a": [1, {"b": 2}]}));
        tree.apply_snapshot(root, &equal).unwrap();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn nodes_are_reused_in_place() {
        let mut tree = Tree::new();
        let root = tree.tweak_node(Value::from(json!({"child": {"y": 1}, "list": [{"n": 1}]}))).unwrap();
        let child = tree.get(root, "child").unwrap().and_then(|e| e.as_node()).unwrap();
        let list = tree.get(root, "list").unwrap().and_then(|e| e.as_node()).unwrap();
        let item = tree.get_index(list, 0).unwrap().and_then(|e| e.as_node()).unwrap();

        let next = Snapshot::from(json!({"child": {"y": 2, "z": 3}, "list": [{"n": 5}, {"n": 6}]}));
        tree.apply_snapshot(root, &next).unwrap();

        assert_eq!(tree.get_snapshot(root).unwrap(), next);
        assert_eq!(tree.get(root, "child").unwrap().and_then(|e| e.as_node()), Some(child));
        assert_eq!(tree.get_index(list, 0).unwrap().and_then(|e| e.as_node()), Some(item));
    }

    #[test]
    fn kind_changes_replace_the_node() {
        let mut tree = Tree::new();
        let root = tree.tweak_node(Value::from(json!({"v": {"a": 1}}))).unwrap();
        let v = tree.get(root, "v").unwrap().and_then(|e| e.as_node()).unwrap();
        tree.apply_snapshot(root, &Snapshot::from(json!({"v": [1]}))).unwrap();
        assert!(tree.is_root(v).unwrap());
        assert_eq!(tree.get_snapshot(root).unwrap().to_json(), json!({"v": [1]}));
    }

    #[test]
    fn model_type_and_id_must_match() {
        let mut tree = Tree::new();
        tree.register_model(ModelType::builder("user").id_field("id").field("name", "").build());
        let entry = tree
            .from_snapshot(&Snapshot::from(json!({"$modelType": "user", "id": "u1", "name": "a"})))
            .unwrap();
        let user = entry.as_node().unwrap();

        let renamed = Snapshot::from(json!({"$modelType": "user", "id": "u1", "name": "b"}));
        tree.apply_snapshot(user, &renamed).unwrap();
        assert_eq!(tree.get_snapshot(user).unwrap(), renamed);

        let other = Snapshot::from(json!({"$modelType": "user", "id": "u2", "name": "b"}));
        assert!(matches!(tree.apply_snapshot(user, &other), Err(TweakError::SnapshotMismatch(_))));
        assert!(matches!(
            tree.apply_snapshot(user, &Snapshot::from(json!([]))),
            Err(TweakError::SnapshotMismatch(_))
        ));
    }

    #[test]
    fn patches_can_target_nested_paths() {
        let mut tree = Tree::new();
        let root = tree.tweak_node(Value::from(json!({"list": [1, 2, 3], "o": {}}))).unwrap();
        let patches = crate::patch::from_json_patch(&json!([
            {"op": "add", "path": ["list", 1], "value": 9},
            {"op": "replace", "path": "/list/length", "value": 2},
            {"op": "add", "path": ["o", "k"], "value": {"deep": true}},
            {"op": "remove", "path": ["list", 0]}
        ]))
        .unwrap();
        tree.apply_patches(root, &patches, false).unwrap();
        assert_eq!(
            tree.get_snapshot(root).unwrap().to_json(),
            json!({"list": [9], "o": {"k": {"deep": true}}})
        );

        let missing = crate::patch::from_json_patch(&json!([{"op": "remove", "path": ["nope", "x"]}])).unwrap();
        assert_eq!(
            tree.apply_patches(root, &missing, false),
            Err(TweakError::Patch(crate::patch::PatchError::NotFound))
        );
    }

    #[test]
    fn copies_of_own_snapshots_apply_cleanly() {
        let mut tree = Tree::new();
        tree.register_model(ModelType::builder("todo").id_field("id").field("text", "").build());
        let root = tree
            .tweak_node(Value::from(json!({"a": 1, "t": {"$modelType": "todo", "id": "t1", "text": "x"}})))
            .unwrap();
        let todo = tree.get(root, "t").unwrap().and_then(|e| e.as_node()).unwrap();
        let data = tree.model_data(todo).unwrap();
        let count = std::rc::Rc::new(std::cell::Cell::new(0));
        let sink = count.clone();
        tree.on_patches(root, move |_, _| sink.set(sink.get() + 1)).unwrap();

        let root_copy = Snapshot::from(tree.get_snapshot(root).unwrap().to_json());
        tree.apply_snapshot(root, &root_copy).unwrap();
        let data_copy = Snapshot::from(tree.get_snapshot(data).unwrap().to_json());
        tree.apply_snapshot(data, &data_copy).unwrap();
        assert_eq!(count.get(), 0);

        let edited = Snapshot::from(json!({"$modelType": "todo", "id": "t1", "text": "y"}));
        tree.apply_snapshot(data, &edited).unwrap();
        assert_eq!(tree.get_snapshot(todo).unwrap(), edited);

        let foreign = Snapshot::from(json!({"$modelType": "other"}));
        tree.register_model(ModelType::builder("other").build());
        assert!(matches!(tree.apply_snapshot(data, &foreign), Err(TweakError::SnapshotMismatch(_))));
    }

    #[test]
    fn failed_patch_lists_change_nothing() {
        let mut tree = Tree::new();
        let root = tree.tweak_node(Value::from(json!({"a": 1, "list": [1]}))).unwrap();
        let before = tree.get_snapshot(root).unwrap();
        let patches = crate::patch::from_json_patch(&json!([
            {"op": "replace", "path": ["a"], "value": 2},
            {"op": "remove", "path": ["list", 5]}
        ]))
        .unwrap();
        assert!(tree.apply_patches(root, &patches, false).is_err());

        let reserved = crate::patch::from_json_patch(&json!([
            {"op": "replace", "path": ["a"], "value": 3},
            {"op": "add", "path": ["$modelType"], "value": "todo"}
        ]))
        .unwrap();
        assert!(matches!(tree.apply_patches(root, &reserved, false), Err(TweakError::InvalidPatch(_))));
        assert!(tree.get_snapshot(root).unwrap().ptr_eq(&before));
    }
}
