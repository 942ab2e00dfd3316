//! JSON codec for patches.
//!
//! Patches encode as `{"op": "...", "path": ..., "value": ...}`. The path is
//! written as an array of segments (`["todos", 0]`) by [`to_json`] and as an
//! RFC 6901 pointer (`"/todos/0"`) by [`to_json_pointer`]; [`from_json`]
//! accepts both.

use serde_json::{Map, Value};
use tweak_tree_pointer::{format_json_pointer, path_from_json, path_to_json};

use super::types::{Patch, PatchError, PatchOp};
use crate::snapshot::Snapshot;

fn encode(patch: &Patch, path: Value) -> Value {
    let mut m = Map::new();
    m.insert("op".into(), Value::String(patch.op.as_str().into()));
    m.insert("path".into(), path);
    if let Some(value) = &patch.value {
        m.insert("value".into(), value.to_json());
    }
    Value::Object(m)
}

pub fn to_json(patch: &Patch) -> Value {
    encode(patch, path_to_json(&patch.path))
}

pub fn to_json_pointer(patch: &Patch) -> Value {
    encode(patch, Value::String(format_json_pointer(&patch.path)))
}

pub fn from_json(v: &Value) -> Result<Patch, PatchError> {
    let obj = v
        .as_object()
        .ok_or_else(|| PatchError::InvalidOp("patch must be an object".into()))?;
    let op = obj
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| PatchError::InvalidOp("missing op".into()))?;
    let op = PatchOp::parse(op)?;
    let path = obj
        .get("path")
        .ok_or_else(|| PatchError::InvalidOp("missing path".into()))?;
    let path = path_from_json(path).map_err(|e| PatchError::InvalidOp(e.to_string()))?;
    let value = obj.get("value").map(Snapshot::from);
    match (op, value) {
        (PatchOp::Remove, _) => Ok(Patch::remove(path)),
        (op, Some(value)) => Ok(Patch {
            op,
            path,
            value: Some(value),
        }),
        (_, None) => Err(PatchError::MissingValue),
    }
}

pub fn to_json_patch(patches: &[Patch]) -> Value {
    Value::Array(patches.iter().map(to_json).collect())
}

pub fn from_json_patch(v: &Value) -> Result<Vec<Patch>, PatchError> {
    v.as_array()
        .ok_or_else(|| PatchError::InvalidOp("patch list must be an array".into()))?
        .iter()
        .map(from_json)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tweak_tree_pointer::PathSegment;

    #[test]
    fn encodes_both_path_forms() {
        let patch = Patch::replace(
            vec![PathSegment::from("child"), PathSegment::Index(0)],
            Snapshot::from(11),
        );
        assert_eq!(to_json(&patch), json!({"op": "replace", "path": ["child", 0], "value": 11}));
        assert_eq!(
            to_json_pointer(&patch),
            json!({"op": "replace", "path": "/child/0", "value": 11})
        );
        assert_eq!(from_json(&to_json(&patch)).unwrap(), patch);
        assert_eq!(from_json(&to_json_pointer(&patch)).unwrap(), patch);
    }

    #[test]
    fn remove_has_no_value() {
        let encoded = to_json(&Patch::remove(vec![PathSegment::from("a")]));
        assert_eq!(encoded, json!({"op": "remove", "path": ["a"]}));
    }

    #[test]
    fn rejects_malformed_patches() {
        assert_eq!(
            from_json(&json!({"op": "add", "path": ["a"]})),
            Err(PatchError::MissingValue)
        );
        assert!(matches!(
            from_json(&json!({"op": "move", "path": ["a"]})),
            Err(PatchError::InvalidOp(_))
        ));
        assert!(matches!(from_json_patch(&json!({})), Err(PatchError::InvalidOp(_))));
    }
}
