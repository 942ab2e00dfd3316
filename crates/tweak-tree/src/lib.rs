//! tweak-tree: tracked object/array trees with structurally shared
//! snapshots, JSON-patch-style change streams and reconciling snapshot
//! application.
//!
//! A [`Tree`] tracks plain objects, arrays and model instances. Every node
//! has at most one parent, caches an immutable [`Snapshot`] that shares
//! untouched branches with its previous versions, and emits forward and
//! inverse [`Patch`]es for each change, bubbled to every ancestor.
//! [`Tree::apply_snapshot`] and [`Tree::apply_patches`] bring a subtree to a
//! target state while reusing existing nodes.

pub mod arena;
pub mod config;
pub mod error;
pub mod model;
pub mod patch;
pub mod recorder;
pub mod snapshot;
pub mod tree;
pub mod value;

pub use arena::NodeId;
pub use config::{ArrayReconciliation, TreeConfig};
pub use error::{Result, TweakError};
pub use model::{ModelType, ModelTypeBuilder};
pub use patch::{Patch, PatchError, PatchOp, PatchPair};
pub use recorder::PatchRecorder;
pub use snapshot::{Snapshot, SnapshotMap, MODEL_TYPE_KEY};
pub use tree::{
    ListenerId, NodeType, ParentChange, ParentLink, RootPath, Tree, DATA_SEGMENT,
};
pub use tweak_tree_pointer::{Path, PathSegment};
pub use value::{Entry, Value};
