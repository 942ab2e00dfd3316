//! Patch and patch-pair types.

use std::fmt;

use thiserror::Error;
use tweak_tree_pointer::{format_json_pointer, prefixed, Path, PathSegment};

use crate::snapshot::Snapshot;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("NOT_FOUND")]
    NotFound,
    #[error("INVALID_INDEX")]
    InvalidIndex,
    #[error("INVALID_TARGET")]
    InvalidTarget,
    #[error("MISSING_VALUE")]
    MissingValue,
    #[error("INVALID_OP: {0}")]
    InvalidOp(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
}

impl PatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchOp::Add => "add",
            PatchOp::Remove => "remove",
            PatchOp::Replace => "replace",
        }
    }

    pub fn parse(s: &str) -> Result<Self, PatchError> {
        match s {
            "add" => Ok(PatchOp::Add),
            "remove" => Ok(PatchOp::Remove),
            "replace" => Ok(PatchOp::Replace),
            other => Err(PatchError::InvalidOp(format!("unknown op: {other}"))),
        }
    }
}

/// One edit: `add` and `replace` carry a value, `remove` does not.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub op: PatchOp,
    pub path: Path,
    pub value: Option<Snapshot>,
}

impl Patch {
    pub fn add(path: Path, value: Snapshot) -> Self {
        Self { op: PatchOp::Add, path, value: Some(value) }
    }

    pub fn remove(path: Path) -> Self {
        Self { op: PatchOp::Remove, path, value: None }
    }

    pub fn replace(path: Path, value: Snapshot) -> Self {
        Self { op: PatchOp::Replace, path, value: Some(value) }
    }

    /// The same patch, one level further out.
    pub fn with_prefix(&self, segment: &PathSegment) -> Self {
        Self {
            op: self.op,
            path: prefixed(segment, &self.path),
            value: self.value.clone(),
        }
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.op.as_str(), format_json_pointer(&self.path))?;
        if let Some(value) = &self.value {
            write!(f, " {value}")?;
        }
        Ok(())
    }
}

/// Forward patches and the inverse patches that undo them.
///
/// `inverse[i]` undoes `forward[i]`; the inverse list is applied in reverse
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchPair {
    pub forward: Vec<Patch>,
    pub inverse: Vec<Patch>,
}

impl PatchPair {
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.inverse.is_empty()
    }

    pub(crate) fn push(&mut self, forward: Patch, inverse: Patch) {
        self.forward.push(forward);
        self.inverse.push(inverse);
    }

    pub fn with_prefix(&self, segment: &PathSegment) -> Self {
        Self {
            forward: self.forward.iter().map(|p| p.with_prefix(segment)).collect(),
            inverse: self.inverse.iter().map(|p| p.with_prefix(segment)).collect(),
        }
    }
}
