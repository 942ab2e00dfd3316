//! Patch emission and bubbling.

use super::Tree;
use crate::arena::NodeId;
use crate::patch::PatchPair;

impl Tree {
    /// Delivers `pair` to listeners of `node`, then to each ancestor with the
    /// child's segment prepended, and finally to global listeners with the
    /// topmost ancestor. The hop from a model's data object to its model adds
    /// no segment.
    pub(crate) fn emit_patches(&mut self, node: NodeId, pair: PatchPair) {
        if pair.is_empty() {
            return;
        }
        log::trace!("{node:?}: {} patches", pair.forward.len());
        let mut current = node;
        let mut pair = pair;
        loop {
            let Some(n) = self.nodes.get_mut(current) else {
                return;
            };
            for listener in n.patch_listeners.values_mut() {
                listener(&pair.forward, &pair.inverse);
            }
            let Some(link) = n.parent.clone() else {
                break;
            };
            if !self.is_data_link(&link, current) {
                pair = pair.with_prefix(&link.segment);
            }
            current = link.parent;
        }
        for listener in self.global_listeners.values_mut() {
            listener(current, &pair.forward, &pair.inverse);
        }
    }
}
