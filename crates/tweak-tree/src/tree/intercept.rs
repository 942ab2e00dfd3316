//! Structural change interception.
//!
//! Each change runs in three phases. `will` checks the write gate and
//! validates the incoming values against the current state; nothing is
//! mutated if it fails. `commit` detaches replaced-out children, tweaks the
//! incoming values and writes the container. `did` updates the snapshot
//! cache and emits the patches of the change.

use std::collections::HashSet;

use indexmap::IndexSet;
use tweak_tree_pointer::PathSegment;

use super::tweak::Incoming;
use super::{ParentLink, Tree};
use crate::arena::NodeId;
use crate::error::{Result, TweakError};
use crate::patch::generate;
use crate::snapshot::MODEL_TYPE_KEY;
use crate::value::{Entry, Value};

/// Whether storing `value` over `entry` would change nothing.
pub(crate) fn value_matches(value: &Value, entry: &Entry) -> bool {
    match (value, entry) {
        (Value::Node(a), Entry::Node(b)) => a == b,
        (value, Entry::Leaf(leaf)) => value.primitive_snapshot().is_some_and(|s| &s == leaf),
        _ => false,
    }
}

fn node_set<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> IndexSet<NodeId> {
    entries.into_iter().filter_map(Entry::as_node).collect()
}

impl Tree {
    fn will_change(&self, target: NodeId, values: &[&Value], releasing: &IndexSet<NodeId>, in_array: bool) -> Result<()> {
        let incoming = Incoming { target: Some(target), releasing };
        let mut seen = HashSet::new();
        for value in values {
            self.validate_incoming(&incoming, value, &mut seen, in_array)?;
        }
        Ok(())
    }

    pub(crate) fn commit_set(&mut self, node: NodeId, key: String, value: Value) -> Result<()> {
        self.check_write()?;
        let object = self.container_of(node)?;
        if key == MODEL_TYPE_KEY {
            return Err(TweakError::UnsupportedValue("$modelType is a reserved key"));
        }
        if matches!(value, Value::Undefined) {
            return self.commit_delete(object, key).map(|_| ());
        }
        let current = self.object_entries(object)?.get(&key).cloned();
        if current.as_ref().is_some_and(|c| value_matches(&value, c)) {
            return Ok(());
        }
        let releasing = node_set(current.iter());
        self.will_change(object, &[&value], &releasing, false)?;

        let old_snapshot = current.as_ref().map(|c| self.entry_snapshot(c)).transpose()?;
        if let Some(old) = &current {
            self.set_entry_parent(old, None)?;
        }
        let entry = self.tweak_value(value, Some(ParentLink::new(object, key.as_str())))?;
        let (standard, pure) = self.entry_snapshots(&entry)?;
        self.object_entries_mut(object)?.insert(key.clone(), entry);

        let segment = PathSegment::Key(key.clone());
        let (next_standard, next_pure) = {
            let base_standard = self.get_snapshot(object)?;
            let base_pure = self.get_pure_snapshot(object)?;
            (
                base_standard.cow_set(&segment, standard.clone()),
                base_pure.cow_set(&segment, pure),
            )
        };
        let (Some(next_standard), Some(next_pure)) = (next_standard, next_pure) else {
            return Err(TweakError::NotAnObject(object));
        };
        self.set_snapshot(object, next_standard, next_pure)?;

        let pair = match old_snapshot {
            None => generate::object_add(&key, &standard),
            Some(old) => generate::object_update(&key, &old, &standard),
        };
        self.emit_patches(object, pair);
        Ok(())
    }

    pub(crate) fn commit_delete(&mut self, node: NodeId, key: String) -> Result<Option<Entry>> {
        self.check_write()?;
        let object = self.container_of(node)?;
        let Some(current) = self.object_entries(object)?.get(&key).cloned() else {
            return Ok(None);
        };
        let old_snapshot = self.entry_snapshot(&current)?;
        self.set_entry_parent(&current, None)?;
        self.object_entries_mut(object)?.shift_remove(&key);

        let next_standard = self.get_snapshot(object)?.cow_remove(&key);
        let next_pure = self.get_pure_snapshot(object)?.cow_remove(&key);
        let (Some(next_standard), Some(next_pure)) = (next_standard, next_pure) else {
            return Err(TweakError::PathNotFound(vec![PathSegment::Key(key)]));
        };
        self.set_snapshot(object, next_standard, next_pure)?;
        self.emit_patches(object, generate::object_remove(&key, &old_snapshot));
        Ok(Some(current))
    }

    pub(crate) fn commit_set_index(&mut self, array: NodeId, index: usize, value: Value) -> Result<()> {
        self.check_write()?;
        let entries = self.array_entries(array)?;
        let len = entries.len();
        let Some(current) = entries.get(index).cloned() else {
            return Err(TweakError::IndexOutOfBounds { index, len });
        };
        if value_matches(&value, &current) {
            return Ok(());
        }
        let releasing = node_set([&current]);
        self.will_change(array, &[&value], &releasing, true)?;

        let old_snapshot = self.entry_snapshot(&current)?;
        self.set_entry_parent(&current, None)?;
        let entry = self.tweak_value(value, Some(ParentLink::new(array, index)))?;
        let (standard, pure) = self.entry_snapshots(&entry)?;
        self.array_entries_mut(array)?[index] = entry;

        let segment = PathSegment::Index(index);
        let next_standard = self.get_snapshot(array)?.cow_set(&segment, standard.clone());
        let next_pure = self.get_pure_snapshot(array)?.cow_set(&segment, pure);
        let (Some(next_standard), Some(next_pure)) = (next_standard, next_pure) else {
            return Err(TweakError::IndexOutOfBounds { index, len });
        };
        self.set_snapshot(array, next_standard, next_pure)?;
        self.emit_patches(array, generate::array_update(index, &old_snapshot, &standard));
        Ok(())
    }

    pub(crate) fn commit_splice(
        &mut self,
        array: NodeId,
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    ) -> Result<Vec<Entry>> {
        self.check_write()?;
        let entries = self.array_entries(array)?;
        let len = entries.len();
        if start > len {
            return Err(TweakError::IndexOutOfBounds { index: start, len });
        }
        let delete_count = delete_count.min(len - start);
        if delete_count == 0 && items.is_empty() {
            return Ok(Vec::new());
        }
        let releasing = node_set(&entries[start..start + delete_count]);
        self.will_change(array, &items.iter().collect::<Vec<_>>(), &releasing, true)?;

        let old_standard = self.get_snapshot(array)?;
        let old_pure = self.get_pure_snapshot(array)?;
        let removed: Vec<Entry> = self
            .array_entries_mut(array)?
            .drain(start..start + delete_count)
            .collect();
        for entry in &removed {
            self.set_entry_parent(entry, None)?;
        }

        let added = items.len();
        let mut inserted = Vec::with_capacity(added);
        let mut standard_items = Vec::with_capacity(added);
        let mut pure_items = Vec::with_capacity(added);
        for (offset, item) in items.into_iter().enumerate() {
            let entry = self.tweak_value(item, Some(ParentLink::new(array, start + offset)))?;
            let (s, p) = self.entry_snapshots(&entry)?;
            standard_items.push(s);
            pure_items.push(p);
            inserted.push(entry);
        }
        self.array_entries_mut(array)?.splice(start..start, inserted);
        if added != delete_count {
            self.reindex_from(array, start + added)?;
        }

        let next_standard = old_standard.cow_splice(start, delete_count, standard_items);
        let next_pure = old_pure.cow_splice(start, delete_count, pure_items);
        let (Some(next_standard), Some(next_pure)) = (next_standard, next_pure) else {
            return Err(TweakError::IndexOutOfBounds { index: start + delete_count, len });
        };
        self.set_snapshot(array, next_standard.clone(), next_pure)?;

        let (Some(old_items), Some(new_items)) = (old_standard.as_array(), next_standard.as_array()) else {
            return Err(TweakError::NotAnArray(array));
        };
        let pair = generate::array_splice(old_items, new_items, start, delete_count, added);
        self.emit_patches(array, pair);
        Ok(removed)
    }

    /// Rewrites the index segment of every tracked item from `from` on.
    fn reindex_from(&mut self, array: NodeId, from: usize) -> Result<()> {
        let moved: Vec<(usize, NodeId)> = self
            .array_entries(array)?
            .iter()
            .enumerate()
            .skip(from)
            .filter_map(|(i, e)| e.as_node().map(|id| (i, id)))
            .collect();
        for (index, id) in moved {
            if let Some(link) = self.node_mut(id)?.parent.as_mut() {
                link.segment = PathSegment::Index(index);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::error::TweakError;
    use crate::model::ModelType;
    use crate::snapshot::Snapshot;
    use crate::tree::{NodeType, Tree};
    use crate::value::{Entry, Value};
    use serde_json::json;
    use tweak_tree_pointer::PathSegment;

    fn node(tree: &Tree, parent: crate::NodeId, key: &str) -> crate::NodeId {
        tree.get(parent, key).unwrap().and_then(|e| e.as_node()).unwrap()
    }

    fn count_patches(tree: &mut Tree, node: crate::NodeId) -> Rc<Cell<usize>> {
        let count = Rc::new(Cell::new(0));
        let sink = count.clone();
        tree.on_patches(node, move |_, _| sink.set(sink.get() + 1)).unwrap();
        count
    }

    #[test]
    fn writes_outside_a_scope_are_rejected() {
        let mut tree = Tree::new();
        let root = tree.tweak_node(Value::from(json!({"a": 1}))).unwrap();
        let emitted = count_patches(&mut tree, root);
        assert_eq!(tree.set(root, "a", 2), Err(TweakError::ProtectionViolation));
        assert_eq!(tree.get_snapshot(root).unwrap().to_json(), json!({"a": 1}));
        assert_eq!(emitted.get(), 0);
    }

    #[test]
    fn splice_keeps_sibling_links_in_step() {
        let mut tree = Tree::new();
        let root = tree.tweak_node(Value::from(json!({"list": [{"n": 0}, {"n": 1}, {"n": 2}]}))).unwrap();
        let list = node(&tree, root, "list");
        let last = tree.get_index(list, 2).unwrap().and_then(|e| e.as_node()).unwrap();

        tree.unprotected(|t| t.remove_index(list, 0)).unwrap();
        assert_eq!(
            tree.root_path(last).unwrap().path,
            vec![PathSegment::from("list"), PathSegment::Index(1)]
        );

        tree.unprotected(|t| t.insert(list, 0, Value::from(json!({"n": -1})))).unwrap();
        assert_eq!(tree.parent_link(last).unwrap().unwrap().segment, PathSegment::Index(2));
    }

    #[test]
    fn reparenting_requires_detach() {
        let mut tree = Tree::new();
        let root = tree.tweak_node(Value::from(json!({"a": {"x": 1}, "b": {}}))).unwrap();
        let a = node(&tree, root, "a");
        let b = node(&tree, root, "b");

        let emitted = count_patches(&mut tree, root);

        let moved = tree.unprotected(|t| t.set(b, "a", a));
        assert!(matches!(moved, Err(TweakError::AlreadyParented { node: n, .. }) if n == a));
        assert_eq!(emitted.get(), 0);

        tree.detach(a).unwrap();
        assert_eq!(emitted.get(), 1);
        assert!(tree.is_root(a).unwrap());
        tree.unprotected(|t| t.set(b, "a", a)).unwrap();
        assert_eq!(tree.parent(a).unwrap(), Some(b));
        assert_eq!(tree.get_snapshot(root).unwrap().to_json(), json!({"b": {"a": {"x": 1}}}));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut tree = Tree::new();
        let root = tree.tweak_node(Value::from(json!({"a": {"b": {}}}))).unwrap();
        let a = node(&tree, root, "a");
        let b = node(&tree, a, "b");
        tree.detach(a).unwrap();
        let emitted = count_patches(&mut tree, a);
        assert_eq!(tree.unprotected(|t| t.set(b, "loop", a)), Err(TweakError::Cycle(a)));
        assert_eq!(tree.unprotected(|t| t.set(a, "self", a)), Err(TweakError::Cycle(a)));
        assert_eq!(emitted.get(), 0);
    }

    #[test]
    fn undefined_deletes_keys_and_fails_in_arrays() {
        let mut tree = Tree::new();
        let root = tree.tweak_node(Value::from(json!({"a": 1, "list": [1]}))).unwrap();
        let list = node(&tree, root, "list");
        let emitted = count_patches(&mut tree, root);
        tree.unprotected(|t| t.set(root, "a", Value::Undefined)).unwrap();
        assert_eq!(tree.get(root, "a").unwrap(), None);
        assert_eq!(emitted.get(), 1);
        assert_eq!(
            tree.unprotected(|t| t.set_index(list, 0, Value::Undefined)),
            Err(TweakError::UndefinedArrayElement)
        );
        assert_eq!(
            tree.unprotected(|t| t.push(list, Value::Undefined)),
            Err(TweakError::UndefinedArrayElement)
        );
        assert_eq!(tree.get_snapshot(list).unwrap().to_json(), json!([1]));
        assert_eq!(emitted.get(), 1);
    }

    #[test]
    fn model_type_key_is_reserved_on_every_object() {
        let mut tree = Tree::new();
        tree.register_model(ModelType::builder("todo").field("text", "").build());
        let root = tree.tweak_node(Value::from(json!({"a": 1}))).unwrap();
        let todo = tree.create_model("todo", Default::default()).unwrap();
        let emitted = count_patches(&mut tree, root);

        let reserved: crate::error::Result<()> =
            Err(TweakError::UnsupportedValue("$modelType is a reserved key"));
        assert_eq!(tree.unprotected(|t| t.set(root, "$modelType", "todo")), reserved);
        assert_eq!(tree.unprotected(|t| t.set(todo, "$modelType", "todo")), reserved);
        assert_eq!(
            tree.unprotected(|t| t.set(root, "o", Value::from(json!({"$modelType": 5})))),
            Err(TweakError::UnsupportedValue("$modelType must name a model type"))
        );

        assert_eq!(emitted.get(), 0);
        assert_eq!(tree.get_pure_snapshot(root).unwrap().to_json(), json!({"a": 1}));
        let copy = Snapshot::from(tree.get_snapshot(root).unwrap().to_json());
        let rebuilt = tree.from_snapshot(&copy).unwrap().as_node().unwrap();
        assert_eq!(tree.kind(rebuilt).unwrap(), NodeType::Object);
    }

    #[test]
    fn replacing_a_child_detaches_it() {
        let mut tree = Tree::new();
        let root = tree.tweak_node(Value::from(json!({"child": {"y": 1}}))).unwrap();
        let child = node(&tree, root, "child");
        tree.unprotected(|t| t.set(root, "child", 5)).unwrap();
        assert!(tree.is_root(child).unwrap());
        assert_eq!(tree.get(root, "child").unwrap(), Some(Entry::Leaf(5.into())));
    }

    #[test]
    fn swapping_within_one_splice_is_allowed() {
        let mut tree = Tree::new();
        let list = tree.tweak_node(Value::from(json!([{"n": 0}, {"n": 1}]))).unwrap();
        let first = tree.get_index(list, 0).unwrap().and_then(|e| e.as_node()).unwrap();
        let second = tree.get_index(list, 1).unwrap().and_then(|e| e.as_node()).unwrap();
        tree.unprotected(|t| t.splice(list, 0, 2, vec![Value::Node(second), Value::Node(first)]))
            .unwrap();
        assert_eq!(tree.get_snapshot(list).unwrap().to_json(), json!([{"n": 1}, {"n": 0}]));
        assert_eq!(tree.parent_link(first).unwrap().unwrap().segment, PathSegment::Index(1));
    }
}
