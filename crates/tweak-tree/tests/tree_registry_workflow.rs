mod common;

use common::{child, item, json_of, todo_type, tree_with};
use serde_json::json;
use tweak_tree::{NodeType, PathSegment, Tree, TweakError, Value};

#[test]
fn a_node_lives_in_one_place_at_a_time() {
    let (mut tree, root) = tree_with(json!({"left": {"leaf": {"v": 1}}, "right": {}}));
    let left = child(&tree, root, "left");
    let right = child(&tree, root, "right");
    let leaf = child(&tree, left, "leaf");

    let err = tree.unprotected(|t| t.set(right, "leaf", leaf)).unwrap_err();
    assert_eq!(
        err,
        TweakError::AlreadyParented { node: leaf, segment: PathSegment::from("leaf") }
    );
    assert_eq!(json_of(&tree, right), json!({}));

    tree.detach(leaf).unwrap();
    assert_eq!(tree.parent(leaf).unwrap(), None);
    assert_eq!(tree.root(leaf).unwrap(), leaf);
    assert_eq!(json_of(&tree, left), json!({}));

    tree.unprotected(|t| t.set(right, "leaf", leaf)).unwrap();
    assert_eq!(tree.parent(leaf).unwrap(), Some(right));
    assert_eq!(tree.root(leaf).unwrap(), root);
    assert_eq!(json_of(&tree, root), json!({"left": {}, "right": {"leaf": {"v": 1}}}));
}

#[test]
fn detached_subtrees_keep_working() {
    let (mut tree, root) = tree_with(json!({"sub": {"items": [1, 2]}}));
    let sub = child(&tree, root, "sub");
    let items = child(&tree, sub, "items");
    tree.detach(sub).unwrap();
    let root_before = tree.get_snapshot(root).unwrap();

    tree.unprotected(|t| t.push(items, 3)).unwrap();

    assert_eq!(json_of(&tree, sub), json!({"items": [1, 2, 3]}));
    assert!(tree.get_snapshot(root).unwrap().ptr_eq(&root_before));
    assert_eq!(tree.root_path(items).unwrap().root, sub);
}

#[test]
fn model_children_report_the_model_as_parent() {
    let mut tree = Tree::new();
    tree.register_model(todo_type());
    let root = tree
        .tweak_node(Value::from(json!({
            "todos": [{"$modelType": "todo", "id": "t1", "text": "a", "tags": ["x"]}]
        })))
        .unwrap();
    let todos = child(&tree, root, "todos");
    let todo = item(&tree, todos, 0);
    let tags = child(&tree, todo, "tags");
    let data = tree.model_data(todo).unwrap();

    assert_eq!(tree.kind(todo).unwrap(), NodeType::Model);
    assert_eq!(tree.kind(data).unwrap(), NodeType::Object);
    assert_eq!(tree.parent(tags).unwrap(), Some(todo));
    assert_eq!(
        tree.root_path(tags).unwrap().path,
        vec![PathSegment::from("todos"), PathSegment::Index(0), PathSegment::from("tags")]
    );
    assert!(tree.is_ancestor_of(todo, data).unwrap());
    assert_eq!(tree.children(todo).unwrap(), vec![tags]);
    assert_eq!(tree.detach(data), Err(TweakError::ModelData(data)));
}

#[test]
fn released_handles_go_stale() {
    let (mut tree, root) = tree_with(json!({"a": {"b": [{}]}}));
    let a = child(&tree, root, "a");
    let b = child(&tree, a, "b");
    let count = tree.node_count();

    tree.detach(a).unwrap();
    assert_eq!(tree.release(a).unwrap(), 3);
    assert_eq!(tree.node_count(), count - 3);
    assert!(!tree.is_tracked(b));
    assert_eq!(tree.len(b), Err(TweakError::StaleNode(b)));

    let fresh = tree.tweak_node(Value::from(json!({}))).unwrap();
    assert_ne!(fresh, a);
    assert_eq!(tree.get_snapshot(a), Err(TweakError::StaleNode(a)));
}

#[test]
fn protection_can_be_switched_off() {
    let (mut tree, root) = tree_with(json!({"n": 0}));
    assert_eq!(tree.set(root, "n", 1), Err(TweakError::ProtectionViolation));
    assert!(!tree.is_write_authorized());

    tree.set_protection(false);
    tree.set(root, "n", 1).unwrap();
    assert_eq!(json_of(&tree, root), json!({"n": 1}));
}
