#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value as JsonValue;
use tweak_tree::{ModelType, NodeId, PatchPair, Tree, Value};

pub type PatchLog = Rc<RefCell<Vec<PatchPair>>>;

pub fn child(tree: &Tree, parent: NodeId, key: &str) -> NodeId {
    tree.get(parent, key)
        .unwrap_or_else(|e| panic!("get {key}: {e}"))
        .and_then(|e| e.as_node())
        .unwrap_or_else(|| panic!("{key} is not a node"))
}

pub fn item(tree: &Tree, array: NodeId, index: usize) -> NodeId {
    tree.get_index(array, index)
        .unwrap_or_else(|e| panic!("get_index {index}: {e}"))
        .and_then(|e| e.as_node())
        .unwrap_or_else(|| panic!("item {index} is not a node"))
}

pub fn json_of(tree: &Tree, node: NodeId) -> JsonValue {
    tree.get_snapshot(node).unwrap().to_json()
}

pub fn tree_with(value: JsonValue) -> (Tree, NodeId) {
    let mut tree = Tree::new();
    let root = tree.tweak_node(Value::from(value)).unwrap();
    (tree, root)
}

pub fn record_patches(tree: &mut Tree, node: NodeId) -> PatchLog {
    let log: PatchLog = Rc::default();
    let sink = log.clone();
    tree.on_patches(node, move |forward, inverse| {
        sink.borrow_mut().push(PatchPair {
            forward: forward.to_vec(),
            inverse: inverse.to_vec(),
        });
    })
    .unwrap();
    log
}

pub fn todo_type() -> ModelType {
    ModelType::builder("todo")
        .id_field("id")
        .field("text", "")
        .field("done", false)
        .build()
}
