//! Patch generation for single committed changes.
//!
//! Each function receives the snapshots of the change as it was committed at
//! the mutated node and returns node-relative patches. Bubbling to ancestors
//! prepends segments later (see `tree::emit`).

use tweak_tree_pointer::PathSegment;

use super::types::{Patch, PatchPair};
use crate::snapshot::Snapshot;

pub const LENGTH_KEY: &str = "length";

fn key_path(key: &str) -> Vec<PathSegment> {
    vec![PathSegment::Key(key.to_string())]
}

fn index_path(index: usize) -> Vec<PathSegment> {
    vec![PathSegment::Index(index)]
}

pub fn object_add(key: &str, value: &Snapshot) -> PatchPair {
    let mut pair = PatchPair::default();
    pair.push(Patch::add(key_path(key), value.clone()), Patch::remove(key_path(key)));
    pair
}

pub fn object_update(key: &str, old: &Snapshot, new: &Snapshot) -> PatchPair {
    let mut pair = PatchPair::default();
    pair.push(
        Patch::replace(key_path(key), new.clone()),
        Patch::replace(key_path(key), old.clone()),
    );
    pair
}

/// The inverse is a `replace`: on object keys it restores the value whether
/// or not the key exists.
pub fn object_remove(key: &str, old: &Snapshot) -> PatchPair {
    let mut pair = PatchPair::default();
    pair.push(Patch::remove(key_path(key)), Patch::replace(key_path(key), old.clone()));
    pair
}

pub fn array_update(index: usize, old: &Snapshot, new: &Snapshot) -> PatchPair {
    let mut pair = PatchPair::default();
    pair.push(
        Patch::replace(index_path(index), new.clone()),
        Patch::replace(index_path(index), old.clone()),
    );
    pair
}

/// Minimal patches for `splice(start, removed, added)`.
///
/// `old` and `new` are the whole array snapshots around the splice. The
/// overlapping range becomes `replace`s (skipping positions whose snapshot
/// did not change), surplus insertions become trailing `add`s, and surplus
/// removals become a single `length` shrink when they reach the end of the
/// array or descending `remove`s otherwise.
pub fn array_splice(
    old: &[Snapshot],
    new: &[Snapshot],
    start: usize,
    removed: usize,
    added: usize,
) -> PatchPair {
    let mut pair = PatchPair::default();
    let overlap = removed.min(added);

    for i in 0..overlap {
        let index = start + i;
        let (before, after) = (&old[index], &new[index]);
        if !before.ptr_eq(after) {
            pair.push(
                Patch::replace(index_path(index), after.clone()),
                Patch::replace(index_path(index), before.clone()),
            );
        }
    }

    if added > removed {
        for i in overlap..added {
            let index = start + i;
            pair.push(
                Patch::add(index_path(index), new[index].clone()),
                Patch::remove(index_path(index)),
            );
        }
    } else if removed > added {
        if start + removed == old.len() {
            pair.forward.push(Patch::replace(
                key_path(LENGTH_KEY),
                Snapshot::Number(new.len().into()),
            ));
            for i in (overlap..removed).rev() {
                let index = start + i;
                pair.inverse.push(Patch::add(index_path(index), old[index].clone()));
            }
        } else {
            for i in (overlap..removed).rev() {
                let index = start + i;
                pair.push(
                    Patch::remove(index_path(index)),
                    Patch::add(index_path(index), old[index].clone()),
                );
            }
        }
    }

    pair
}
