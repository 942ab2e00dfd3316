//! Parent links and tree queries.
//!
//! Every tracked node records at most one [`ParentLink`]. A model's data
//! object is linked to its model under [`DATA_SEGMENT`](super::DATA_SEGMENT); that hop is hidden
//! from the public queries, so children of a model report the model as their
//! parent and paths never contain the data segment.

use tweak_tree_pointer::{Path, PathSegment};

use super::{NodeKind, ParentLink, Tree};
use crate::arena::NodeId;
use crate::error::{Result, TweakError};
use crate::value::Entry;

/// Outcome of [`Tree::set_parent`]-style link updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentChange {
    /// The value was a primitive; there is nothing to link.
    NotApplicable,
    Updated {
        old: Option<ParentLink>,
        new: Option<ParentLink>,
        changed: bool,
    },
}

/// The topmost ancestor of a node and the path from it down to the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootPath {
    pub root: NodeId,
    pub path: Path,
}

impl Tree {
    /// Records `link` as the parent of `node`, or clears it with `None`.
    ///
    /// Moving a node that already has a different parent is rejected; it has
    /// to be cleared first.
    pub(crate) fn set_parent(&mut self, node: NodeId, link: Option<ParentLink>) -> Result<ParentChange> {
        let n = self.node_mut(node)?;
        if let (Some(current), Some(next)) = (&n.parent, &link) {
            if current != next {
                return Err(TweakError::AlreadyParented {
                    node,
                    segment: current.segment.clone(),
                });
            }
        }
        let changed = n.parent != link;
        let old = std::mem::replace(&mut n.parent, link.clone());
        Ok(ParentChange::Updated { old, new: link, changed })
    }

    pub(crate) fn set_entry_parent(&mut self, entry: &Entry, link: Option<ParentLink>) -> Result<ParentChange> {
        match entry {
            Entry::Node(id) => self.set_parent(*id, link),
            Entry::Leaf(_) => Ok(ParentChange::NotApplicable),
        }
    }

    /// Whether `link` is the hop from a model's data object to the model.
    pub(crate) fn is_data_link(&self, link: &ParentLink, child: NodeId) -> bool {
        matches!(
            self.nodes.get(link.parent).map(|p| &p.kind),
            Some(NodeKind::Model { data, .. }) if *data == child
        )
    }

    /// True for data objects owned by a model.
    pub(crate) fn is_model_data(&self, node: NodeId) -> bool {
        self.nodes
            .get(node)
            .and_then(|n| n.parent.as_ref())
            .is_some_and(|link| self.is_data_link(link, node))
    }

    fn raw_parent(&self, node: NodeId) -> Result<Option<ParentLink>> {
        Ok(self.node(node)?.parent.clone())
    }

    /// The parent link of `node`, with a model's data object folded into its
    /// model.
    pub fn parent_link(&self, node: NodeId) -> Result<Option<ParentLink>> {
        let Some(link) = self.raw_parent(node)? else {
            return Ok(None);
        };
        match self.raw_parent(link.parent)? {
            Some(up) if self.is_data_link(&up, link.parent) => Ok(Some(ParentLink {
                parent: up.parent,
                segment: link.segment,
            })),
            _ => Ok(Some(link)),
        }
    }

    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        Ok(self.parent_link(node)?.map(|l| l.parent))
    }

    pub fn root(&self, node: NodeId) -> Result<NodeId> {
        let mut current = node;
        while let Some(link) = self.raw_parent(current)? {
            current = link.parent;
        }
        Ok(current)
    }

    pub fn is_root(&self, node: NodeId) -> Result<bool> {
        Ok(self.node(node)?.parent.is_none())
    }

    pub fn root_path(&self, node: NodeId) -> Result<RootPath> {
        let mut path = Vec::new();
        let mut current = node;
        while let Some(link) = self.raw_parent(current)? {
            if !self.is_data_link(&link, current) {
                path.push(link.segment);
            }
            current = link.parent;
        }
        path.reverse();
        Ok(RootPath { root: current, path })
    }

    /// Whether `ancestor` is a strict ancestor of `node`.
    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> Result<bool> {
        self.node(ancestor)?;
        let mut current = node;
        while let Some(link) = self.raw_parent(current)? {
            if link.parent == ancestor {
                return Ok(true);
            }
            current = link.parent;
        }
        Ok(false)
    }

    pub fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> Result<bool> {
        self.is_ancestor_of(ancestor, node)
    }

    /// Path from `ancestor` down to `node`, or `None` when `node` is not
    /// below it. The path to the node itself is empty.
    pub fn path_to(&self, ancestor: NodeId, node: NodeId) -> Result<Option<Path>> {
        self.node(ancestor)?;
        let mut path = Vec::new();
        let mut current = node;
        loop {
            if current == ancestor {
                path.reverse();
                return Ok(Some(path));
            }
            let Some(link) = self.raw_parent(current)? else {
                return Ok(None);
            };
            if !self.is_data_link(&link, current) {
                path.push(link.segment);
            }
            current = link.parent;
        }
    }

    /// Looks up what `path` addresses below `node`. Numeric segments address
    /// object keys by their string form.
    pub fn resolve_path(&self, node: NodeId, path: &[PathSegment]) -> Result<Option<Entry>> {
        let mut current = Entry::Node(node);
        for segment in path {
            let Entry::Node(id) = current else {
                return Ok(None);
            };
            match self.child_entry(id, segment)? {
                Some(entry) => current = entry,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    pub(crate) fn child_entry(&self, node: NodeId, segment: &PathSegment) -> Result<Option<Entry>> {
        let container = self.container_of(node)?;
        Ok(match (&self.node(container)?.kind, segment) {
            (NodeKind::Object(entries), segment) => entries.get(&*segment.token()).cloned(),
            (NodeKind::Array(entries), PathSegment::Index(i)) => entries.get(*i).cloned(),
            _ => None,
        })
    }

    /// Removes `node` from its parent container, leaving it a detached root.
    /// Runs in its own write scope.
    pub fn detach(&mut self, node: NodeId) -> Result<()> {
        let Some(link) = self.raw_parent(node)? else {
            return Ok(());
        };
        if self.is_data_link(&link, node) {
            return Err(TweakError::ModelData(node));
        }
        log::trace!("detaching {node:?} from {:?} at {}", link.parent, link.segment);
        self.unprotected(|t| match link.segment {
            PathSegment::Key(key) => t.commit_delete(link.parent, key).map(|_| ()),
            PathSegment::Index(index) => t.commit_splice(link.parent, index, 1, Vec::new()).map(|_| ()),
        })
    }

    /// Frees a detached subtree. Handles into it become stale.
    pub fn release(&mut self, node: NodeId) -> Result<usize> {
        if self.node(node)?.parent.is_some() {
            return Err(TweakError::HasParent(node));
        }
        let mut stack = vec![node];
        let mut freed = 0;
        while let Some(id) = stack.pop() {
            let Some(removed) = self.nodes.remove(id) else {
                continue;
            };
            freed += 1;
            match removed.kind {
                NodeKind::Object(entries) => stack.extend(entries.values().filter_map(Entry::as_node)),
                NodeKind::Array(entries) => stack.extend(entries.iter().filter_map(Entry::as_node)),
                NodeKind::Model { data, .. } => stack.push(data),
            }
            self.pending_snapshots.shift_remove(&id);
        }
        log::debug!("released {freed} nodes rooted at {node:?}");
        Ok(freed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use serde_json::json;

    #[test]
    fn set_parent_reports_changes() {
        let mut tree = Tree::new();
        let a = tree.tweak_node(Value::from(json!({}))).unwrap();
        let b = tree.tweak_node(Value::from(json!({}))).unwrap();
        let link = ParentLink::new(a, "b");

        let first = tree.set_parent(b, Some(link.clone())).unwrap();
        assert_eq!(
            first,
            ParentChange::Updated { old: None, new: Some(link.clone()), changed: true }
        );
        let again = tree.set_parent(b, Some(link.clone())).unwrap();
        assert!(matches!(again, ParentChange::Updated { changed: false, .. }));

        let elsewhere = tree.set_parent(b, Some(ParentLink::new(a, "c")));
        assert!(matches!(elsewhere, Err(TweakError::AlreadyParented { .. })));

        let cleared = tree.set_parent(b, None).unwrap();
        assert_eq!(
            cleared,
            ParentChange::Updated { old: Some(link), new: None, changed: true }
        );
    }

    #[test]
    fn primitives_have_no_parent_link() {
        let mut tree = Tree::new();
        let change = tree.set_entry_parent(&Entry::Leaf(1.into()), None).unwrap();
        assert_eq!(change, ParentChange::NotApplicable);
    }

    #[test]
    fn paths_and_ancestry() {
        let mut tree = Tree::new();
        let root = tree
            .tweak_node(Value::from(json!({"list": [{"name": "a"}, {"name": "b"}]})))
            .unwrap();
        let list = tree.get(root, "list").unwrap().and_then(|e| e.as_node()).unwrap();
        let second = tree.get_index(list, 1).unwrap().and_then(|e| e.as_node()).unwrap();

        let rp = tree.root_path(second).unwrap();
        assert_eq!(rp.root, root);
        assert_eq!(rp.path, vec![PathSegment::from("list"), PathSegment::Index(1)]);
        assert_eq!(tree.path_to(list, second).unwrap(), Some(vec![PathSegment::Index(1)]));
        assert_eq!(tree.path_to(second, list).unwrap(), None);
        assert!(tree.is_ancestor_of(root, second).unwrap());
        assert!(!tree.is_ancestor_of(second, root).unwrap());
        assert!(tree.is_descendant_of(second, list).unwrap());
        assert_eq!(tree.resolve_path(root, &rp.path).unwrap(), Some(Entry::Node(second)));
        assert_eq!(
            tree.resolve_path(root, &[PathSegment::from("list"), PathSegment::Index(7)])
                .unwrap(),
            None
        );
    }

    #[test]
    fn release_requires_a_detached_root() {
        let mut tree = Tree::new();
        let root = tree.tweak_node(Value::from(json!({"a": {"b": {}}}))).unwrap();
        let a = tree.get(root, "a").unwrap().and_then(|e| e.as_node()).unwrap();
        assert_eq!(tree.release(a), Err(TweakError::HasParent(a)));
        tree.detach(a).unwrap();
        assert_eq!(tree.release(a).unwrap(), 2);
        assert_eq!(tree.get_snapshot(a), Err(TweakError::StaleNode(a)));
        assert_eq!(tree.get_snapshot(root).unwrap().to_json(), json!({}));
    }
}
