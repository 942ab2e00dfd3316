//! Error types returned by tree operations.

use thiserror::Error;
use tweak_tree_pointer::{Path, PathSegment};

use crate::arena::NodeId;
use crate::patch::PatchError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TweakError {
    /// A structural mutation was attempted with no write scope active.
    #[error("data changes must be performed inside an unprotected scope or an action")]
    ProtectionViolation,
    /// The node already lives elsewhere in a tree and must be detached first.
    #[error("node {node:?} already has a parent (at {segment}); detach it first")]
    AlreadyParented { node: NodeId, segment: PathSegment },
    #[error("unsupported value kind: {0}")]
    UnsupportedValue(&'static str),
    #[error("undefined is not allowed as an array element; use null instead")]
    UndefinedArrayElement,
    /// Attaching the node would make it its own ancestor.
    #[error("node {0:?} cannot be attached under itself or one of its descendants")]
    Cycle(NodeId),
    #[error("node {0:?} appears more than once in the same change")]
    DuplicateNode(NodeId),
    #[error("node handle {0:?} is stale or was released")]
    StaleNode(NodeId),
    #[error("node {0:?} is not an object or model")]
    NotAnObject(NodeId),
    #[error("node {0:?} is not an array")]
    NotAnArray(NodeId),
    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("path not found: {0:?}")]
    PathNotFound(Path),
    #[error("invalid patch: {0}")]
    InvalidPatch(String),
    #[error("unknown model type: {0}")]
    UnknownModelType(String),
    #[error("snapshot does not match the target: {0}")]
    SnapshotMismatch(String),
    #[error("node {0:?} is the data object of a model and cannot be detached")]
    ModelData(NodeId),
    /// Only detached roots can be released.
    #[error("node {0:?} still has a parent")]
    HasParent(NodeId),
    #[error(transparent)]
    Patch(#[from] PatchError),
}

pub type Result<T, E = TweakError> = std::result::Result<T, E>;
