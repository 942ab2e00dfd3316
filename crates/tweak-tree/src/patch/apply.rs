//! Applying patches to plain snapshots.
//!
//! This is the snapshot-only counterpart of `Tree::apply_patches`: nothing is
//! tracked, every step returns the next snapshot version and shares every
//! container the patch does not touch.

use tweak_tree_pointer::PathSegment;

use super::generate::LENGTH_KEY;
use super::types::{Patch, PatchError, PatchOp};
use crate::snapshot::Snapshot;

/// Applies one patch, returning the next version of `doc`.
pub fn apply_patch(doc: &Snapshot, patch: &Patch) -> Result<Snapshot, PatchError> {
    match patch.path.split_first() {
        None => match patch.op {
            PatchOp::Add | PatchOp::Replace => patch.value.clone().ok_or(PatchError::MissingValue),
            PatchOp::Remove => Err(PatchError::InvalidTarget),
        },
        Some(_) => update_at(doc, &patch.path, patch),
    }
}

/// Applies `patches` in order, or from last to first when `reverse` is set
/// (the order inverse patch lists are replayed in).
pub fn apply_patches(doc: &Snapshot, patches: &[Patch], reverse: bool) -> Result<Snapshot, PatchError> {
    let mut current = doc.clone();
    if reverse {
        for patch in patches.iter().rev() {
            current = apply_patch(&current, patch)?;
        }
    } else {
        for patch in patches {
            current = apply_patch(&current, patch)?;
        }
    }
    Ok(current)
}

fn update_at(doc: &Snapshot, path: &[PathSegment], patch: &Patch) -> Result<Snapshot, PatchError> {
    let (head, rest) = path.split_first().ok_or(PatchError::InvalidTarget)?;
    if rest.is_empty() {
        return apply_at_container(doc, head, patch);
    }
    let child = doc.at(head).ok_or(PatchError::NotFound)?;
    let next_child = update_at(child, rest, patch)?;
    doc.cow_set(&object_segment(doc, head), next_child)
        .ok_or(PatchError::InvalidTarget)
}

/// Objects address numeric segments by their string form.
fn object_segment(doc: &Snapshot, segment: &PathSegment) -> PathSegment {
    match (doc, segment) {
        (Snapshot::Object(_), PathSegment::Index(i)) => PathSegment::Key(i.to_string()),
        _ => segment.clone(),
    }
}

fn value_of(patch: &Patch) -> Result<Snapshot, PatchError> {
    patch.value.clone().ok_or(PatchError::MissingValue)
}

fn apply_at_container(
    container: &Snapshot,
    segment: &PathSegment,
    patch: &Patch,
) -> Result<Snapshot, PatchError> {
    match container {
        Snapshot::Object(map) => {
            let key = segment.token();
            match patch.op {
                // replace doubles as add on object keys
                PatchOp::Add | PatchOp::Replace => container
                    .cow_set(&PathSegment::Key(key.into_owned()), value_of(patch)?)
                    .ok_or(PatchError::InvalidTarget),
                PatchOp::Remove => {
                    if !map.contains_key(&*key) {
                        return Err(PatchError::NotFound);
                    }
                    container.cow_remove(&key).ok_or(PatchError::NotFound)
                }
            }
        }
        Snapshot::Array(items) => {
            let len = items.len();
            match (patch.op, segment) {
                (PatchOp::Add, PathSegment::Index(i)) if *i <= len => container
                    .cow_splice(*i, 0, vec![value_of(patch)?])
                    .ok_or(PatchError::InvalidIndex),
                (PatchOp::Add, PathSegment::Key(k)) if k == "-" => container
                    .cow_splice(len, 0, vec![value_of(patch)?])
                    .ok_or(PatchError::InvalidIndex),
                (PatchOp::Remove, PathSegment::Index(i)) if *i < len => {
                    container.cow_splice(*i, 1, Vec::new()).ok_or(PatchError::InvalidIndex)
                }
                (PatchOp::Replace, PathSegment::Index(i)) if *i < len => container
                    .cow_set(segment, value_of(patch)?)
                    .ok_or(PatchError::InvalidIndex),
                (PatchOp::Replace, PathSegment::Key(k)) if k == LENGTH_KEY => {
                    let new_len = length_of(&value_of(patch)?)?;
                    if new_len > len {
                        return Err(PatchError::InvalidIndex);
                    }
                    container
                        .cow_splice(new_len, len - new_len, Vec::new())
                        .ok_or(PatchError::InvalidIndex)
                }
                (_, PathSegment::Index(_)) => Err(PatchError::InvalidIndex),
                (_, PathSegment::Key(_)) => Err(PatchError::InvalidIndex),
            }
        }
        _ => Err(PatchError::InvalidTarget),
    }
}

pub(crate) fn length_of(value: &Snapshot) -> Result<usize, PatchError> {
    match value {
        Snapshot::Number(n) => n
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or(PatchError::InvalidIndex),
        _ => Err(PatchError::InvalidIndex),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seg(key: &str) -> PathSegment {
        PathSegment::from(key)
    }

    #[test]
    fn nested_replace_shares_siblings() {
        let doc = Snapshot::from(json!({"x": {"k": 1}, "child": {"y": 10}}));
        let next = apply_patch(
            &doc,
            &Patch::replace(vec![seg("child"), seg("y")], Snapshot::from(11)),
        )
        .unwrap();
        assert_eq!(next.to_json(), json!({"x": {"k": 1}, "child": {"y": 11}}));
        assert!(doc.get("x").unwrap().ptr_eq(next.get("x").unwrap()));
    }

    #[test]
    fn object_replace_on_missing_key_inserts() {
        let doc = Snapshot::from(json!({}));
        let next = apply_patch(&doc, &Patch::replace(vec![seg("a")], Snapshot::from(1))).unwrap();
        assert_eq!(next.to_json(), json!({"a": 1}));
    }

    #[test]
    fn remove_of_missing_key_fails() {
        let doc = Snapshot::from(json!({"a": 1}));
        assert_eq!(
            apply_patch(&doc, &Patch::remove(vec![seg("b")])),
            Err(PatchError::NotFound)
        );
    }

    #[test]
    fn length_replace_only_shrinks() {
        let doc = Snapshot::from(json!([1, 2, 3]));
        let shrunk = apply_patch(&doc, &Patch::replace(vec![seg("length")], Snapshot::from(1))).unwrap();
        assert_eq!(shrunk.to_json(), json!([1]));
        assert_eq!(
            apply_patch(&doc, &Patch::replace(vec![seg("length")], Snapshot::from(5))),
            Err(PatchError::InvalidIndex)
        );
    }

    #[test]
    fn array_add_inserts_and_appends() {
        let doc = Snapshot::from(json!(["a", "c"]));
        let next = apply_patch(&doc, &Patch::add(vec![PathSegment::Index(1)], Snapshot::from("b"))).unwrap();
        let next = apply_patch(&next, &Patch::add(vec![seg("-")], Snapshot::from("d"))).unwrap();
        assert_eq!(next.to_json(), json!(["a", "b", "c", "d"]));
    }

    #[test]
    fn root_paths() {
        let doc = Snapshot::from(json!({"a": 1}));
        let next = apply_patch(&doc, &Patch::replace(Vec::new(), Snapshot::from(json!([])))).unwrap();
        assert_eq!(next.to_json(), json!([]));
        assert_eq!(apply_patch(&doc, &Patch::remove(Vec::new())), Err(PatchError::InvalidTarget));
    }
}
