//! Per-node snapshot cache.
//!
//! Each object and array node caches its standard and pure snapshots plus a
//! version counter bumped whenever the cached reference changes. A change is
//! written at the mutated node and copied upward one container at a time, so
//! siblings keep their references. The data-object to model hop updates no
//! cache of its own: models read their data object's entry.

use super::{SnapshotCache, Tree};
use crate::arena::NodeId;
use crate::error::{Result, TweakError};
use crate::snapshot::Snapshot;
use crate::value::Entry;

impl SnapshotCache {
    pub(crate) fn new(standard: Snapshot, pure: Snapshot) -> Self {
        Self { standard, pure, version: 0 }
    }
}

impl Tree {
    fn cache(&self, node: NodeId) -> Result<&SnapshotCache> {
        let owner = self.container_of(node)?;
        self.node(owner)?.cache.as_ref().ok_or(TweakError::StaleNode(node))
    }

    /// Standard snapshot: model data objects carry `$modelType`.
    pub fn get_snapshot(&self, node: NodeId) -> Result<Snapshot> {
        Ok(self.cache(node)?.standard.clone())
    }

    /// Plain JSON snapshot without model metadata.
    pub fn get_pure_snapshot(&self, node: NodeId) -> Result<Snapshot> {
        Ok(self.cache(node)?.pure.clone())
    }

    /// Counter bumped every time `node`'s snapshot reference changes.
    pub fn snapshot_version(&self, node: NodeId) -> Result<u64> {
        Ok(self.cache(node)?.version)
    }

    pub(crate) fn entry_snapshots(&self, entry: &Entry) -> Result<(Snapshot, Snapshot)> {
        match entry {
            Entry::Leaf(s) => Ok((s.clone(), s.clone())),
            Entry::Node(id) => {
                let cache = self.cache(*id)?;
                Ok((cache.standard.clone(), cache.pure.clone()))
            }
        }
    }

    pub(crate) fn entry_snapshot(&self, entry: &Entry) -> Result<Snapshot> {
        Ok(self.entry_snapshots(entry)?.0)
    }

    /// Stores the next snapshots of `node` and propagates them to every
    /// ancestor. Identical references are a no-op.
    pub(crate) fn set_snapshot(&mut self, node: NodeId, standard: Snapshot, pure: Snapshot) -> Result<()> {
        let mut current = node;
        let (mut standard, mut pure) = (standard, pure);
        loop {
            let n = self.node_mut(current)?;
            let Some(cache) = n.cache.as_mut() else {
                return Err(TweakError::NotAnObject(current));
            };
            if cache.standard.ptr_eq(&standard) && cache.pure.ptr_eq(&pure) {
                return Ok(());
            }
            let previous = std::mem::replace(&mut cache.standard, standard.clone());
            cache.pure = pure.clone();
            cache.version += 1;
            let mut link = n.parent.clone();
            self.queue_snapshot_change(current, &previous);

            if let Some(data_link) = link.clone().filter(|l| self.is_data_link(l, current)) {
                self.queue_snapshot_change(data_link.parent, &previous);
                link = self.node(data_link.parent)?.parent.clone();
            }
            let Some(link) = link else {
                return Ok(());
            };

            let parent = self.node(link.parent)?;
            let Some(parent_cache) = parent.cache.as_ref() else {
                return Err(TweakError::NotAnObject(link.parent));
            };
            let next_standard = parent_cache.standard.cow_set(&link.segment, standard);
            let next_pure = parent_cache.pure.cow_set(&link.segment, pure);
            match (next_standard, next_pure) {
                (Some(s), Some(p)) => {
                    standard = s;
                    pure = p;
                }
                _ => return Err(TweakError::PathNotFound(vec![link.segment])),
            }
            current = link.parent;
        }
    }

    fn queue_snapshot_change(&mut self, node: NodeId, previous: &Snapshot) {
        let watched = self
            .nodes
            .get(node)
            .is_some_and(|n| !n.snapshot_listeners.is_empty());
        if watched && !self.pending_snapshots.contains_key(&node) {
            self.pending_snapshots.insert(node, previous.clone());
        }
    }

    /// Calls snapshot listeners for every node whose reference differs from
    /// the one it had when first queued.
    pub(crate) fn flush_snapshot_listeners(&mut self) {
        let pending = std::mem::take(&mut self.pending_snapshots);
        for (node, previous) in pending {
            let Ok(current) = self.get_snapshot(node) else {
                continue;
            };
            if current.ptr_eq(&previous) {
                continue;
            }
            if let Some(n) = self.nodes.get_mut(node) {
                for listener in n.snapshot_listeners.values_mut() {
                    listener(&current, &previous);
                }
            }
        }
    }
}
