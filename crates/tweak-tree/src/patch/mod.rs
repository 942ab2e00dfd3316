//! Patches: types, generation rules, snapshot application and JSON codec.
//!
//! Every committed change produces a [`PatchPair`]. Forward patches describe
//! the change, inverse patches undo it when replayed from last to first.
//! Only three operations exist: `add`, `remove` and `replace`; array shrinks
//! that reach the end of the array are expressed as `replace` of `length`.

pub mod types;
pub mod generate;
pub mod apply;
pub mod codec;

pub use types::{Patch, PatchError, PatchOp, PatchPair};
pub use apply::{apply_patch, apply_patches};
pub use codec::{from_json, from_json_patch, to_json, to_json_patch, to_json_pointer};
pub use generate::LENGTH_KEY;
