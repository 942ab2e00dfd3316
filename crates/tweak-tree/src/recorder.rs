//! Recording the patches produced below a node.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::arena::NodeId;
use crate::error::Result;
use crate::patch::{Patch, PatchPair};
use crate::tree::{ListenerId, Tree};

/// Collects one [`PatchPair`] per change made at or below a node.
///
/// ```
/// use serde_json::json;
/// use tweak_tree::{PatchRecorder, Tree, Value};
///
/// let mut tree = Tree::new();
/// let root = tree.tweak_node(Value::from(json!({"n": 1}))).unwrap();
/// let recorder = PatchRecorder::new(&mut tree, root).unwrap();
///
/// tree.unprotected(|t| t.set(root, "n", 2)).unwrap();
/// let undo = recorder.inverse_patches();
/// tree.apply_patches(root, &undo, true).unwrap();
///
/// assert_eq!(tree.get_snapshot(root).unwrap().to_json(), json!({"n": 1}));
/// assert!(recorder.dispose(&mut tree));
/// ```
pub struct PatchRecorder {
    node: NodeId,
    listener: ListenerId,
    recording: Rc<Cell<bool>>,
    events: Rc<RefCell<Vec<PatchPair>>>,
}

impl PatchRecorder {
    pub fn new(tree: &mut Tree, node: NodeId) -> Result<Self> {
        let recording = Rc::new(Cell::new(true));
        let events = Rc::new(RefCell::new(Vec::new()));
        let (on, sink) = (recording.clone(), events.clone());
        let listener = tree.on_patches(node, move |forward, inverse| {
            if on.get() {
                sink.borrow_mut().push(PatchPair {
                    forward: forward.to_vec(),
                    inverse: inverse.to_vec(),
                });
            }
        })?;
        Ok(Self { node, listener, recording, events })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn is_recording(&self) -> bool {
        self.recording.get()
    }

    pub fn pause(&self) {
        self.recording.set(false);
    }

    pub fn resume(&self) {
        self.recording.set(true);
    }

    pub fn events(&self) -> Vec<PatchPair> {
        self.events.borrow().clone()
    }

    pub fn take_events(&self) -> Vec<PatchPair> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    /// Every recorded forward patch, in order.
    pub fn forward_patches(&self) -> Vec<Patch> {
        self.events.borrow().iter().flat_map(|e| e.forward.iter().cloned()).collect()
    }

    /// Every recorded inverse patch, in recording order. Apply with
    /// `reverse` set to undo the recorded changes.
    pub fn inverse_patches(&self) -> Vec<Patch> {
        self.events.borrow().iter().flat_map(|e| e.inverse.iter().cloned()).collect()
    }

    /// Stops recording for good. Returns whether the listener was still
    /// registered.
    pub fn dispose(self, tree: &mut Tree) -> bool {
        tree.off_patches(self.node, self.listener)
    }
}
