//! Path segments and JSON Pointer (RFC 6901) helpers for tweak-tree.
//!
//! A location inside a tracked tree is a sequence of [`PathSegment`]s: object
//! keys and array indices. Patches carry such paths, and this crate converts
//! them to and from pointer strings and JSON arrays.
//!
//! # Example
//!
//! ```
//! use tweak_tree_pointer::{format_json_pointer, parse_json_pointer, PathSegment};
//!
//! let path = parse_json_pointer("/todos/0/title").unwrap();
//! assert_eq!(
//!     path,
//!     vec![
//!         PathSegment::from("todos"),
//!         PathSegment::Index(0),
//!         PathSegment::from("title"),
//!     ]
//! );
//! assert_eq!(format_json_pointer(&path), "/todos/0/title");
//! ```

use std::borrow::Cow;
use std::fmt;

use serde_json::Value;
use thiserror::Error;

pub mod validate;
pub use validate::{validate_json_pointer, validate_path, ValidationError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PointerError {
    #[error("NO_PARENT")]
    NoParent,
    #[error("INVALID_INDEX")]
    InvalidIndex,
    #[error("INVALID_SEGMENT: {0}")]
    InvalidSegment(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// One step of a path: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A location relative to some node, outermost segment first.
pub type Path = Vec<PathSegment>;

impl PathSegment {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathSegment::Key(k) => Some(k),
            PathSegment::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Index(i) => Some(*i),
            PathSegment::Key(_) => None,
        }
    }

    /// The unescaped pointer token for this segment.
    pub fn token(&self) -> Cow<'_, str> {
        match self {
            PathSegment::Key(k) => Cow::Borrowed(k),
            PathSegment::Index(i) => Cow::Owned(i.to_string()),
        }
    }

    /// Interprets a raw token: canonical array indices become
    /// [`PathSegment::Index`], everything else a key.
    pub fn from_token(token: &str) -> Self {
        if is_valid_index(token) {
            if let Ok(i) = token.parse() {
                return PathSegment::Index(i);
            }
        }
        PathSegment::Key(token.to_string())
    }

    /// JSON form used in array-style paths: strings for keys, numbers for
    /// indices.
    pub fn to_json(&self) -> Value {
        match self {
            PathSegment::Key(k) => Value::String(k.clone()),
            PathSegment::Index(i) => Value::from(*i),
        }
    }

    pub fn from_json(value: &Value) -> Result<Self, PointerError> {
        match value {
            Value::String(s) => Ok(PathSegment::Key(s.clone())),
            Value::Number(n) => n
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .map(PathSegment::Index)
                .ok_or(PointerError::InvalidIndex),
            other => Err(PointerError::InvalidSegment(other.to_string())),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => f.write_str(k),
            PathSegment::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Unescapes a pointer token: `~1` becomes `/`, `~0` becomes `~`.
///
/// ```
/// use tweak_tree_pointer::unescape_component;
///
/// assert_eq!(unescape_component("a~0b"), "a~b");
/// assert_eq!(unescape_component("c~1d"), "c/d");
/// ```
pub fn unescape_component(component: &str) -> String {
    if !component.contains('~') {
        return component.to_string();
    }
    // ~1 first, otherwise "~01" would decode to "/"
    component.replace("~1", "/").replace("~0", "~")
}

/// Escapes a pointer token: `~` becomes `~0`, `/` becomes `~1`.
///
/// ```
/// use tweak_tree_pointer::escape_component;
///
/// assert_eq!(escape_component("a~b"), "a~0b");
/// assert_eq!(escape_component("c/d"), "c~1d");
/// ```
pub fn escape_component(component: &str) -> String {
    if !component.contains('/') && !component.contains('~') {
        return component.to_string();
    }
    component.replace('~', "~0").replace('/', "~1")
}

/// Parses a pointer string into segments.
///
/// The empty pointer is the root path. Tokens that are canonical array
/// indices (`0`, `17`, not `007`) become [`PathSegment::Index`].
///
/// ```
/// use tweak_tree_pointer::{parse_json_pointer, PathSegment};
///
/// assert!(parse_json_pointer("").unwrap().is_empty());
/// assert_eq!(parse_json_pointer("/a~1b").unwrap(), vec![PathSegment::from("a/b")]);
/// assert!(parse_json_pointer("no-slash").is_err());
/// ```
pub fn parse_json_pointer(pointer: &str) -> Result<Path, PointerError> {
    validate_json_pointer(pointer)?;
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    Ok(pointer[1..]
        .split('/')
        .map(|token| PathSegment::from_token(&unescape_component(token)))
        .collect())
}

/// Formats segments as a pointer string. The root path formats as `""`.
pub fn format_json_pointer(path: &[PathSegment]) -> String {
    let mut out = String::with_capacity(path.len() * 8);
    for segment in path {
        out.push('/');
        out.push_str(&escape_component(&segment.token()));
    }
    out
}

/// Encodes a path as a JSON array (`["todos", 0, "title"]`).
pub fn path_to_json(path: &[PathSegment]) -> Value {
    Value::Array(path.iter().map(PathSegment::to_json).collect())
}

/// Decodes a path from either a pointer string or a JSON array.
pub fn path_from_json(value: &Value) -> Result<Path, PointerError> {
    match value {
        Value::String(pointer) => parse_json_pointer(pointer),
        Value::Array(items) => {
            let path = items
                .iter()
                .map(PathSegment::from_json)
                .collect::<Result<Path, _>>()?;
            validate_path(&path)?;
            Ok(path)
        }
        other => Err(PointerError::InvalidSegment(other.to_string())),
    }
}

/// Returns a new path with `prefix` prepended.
pub fn prefixed(prefix: &PathSegment, path: &[PathSegment]) -> Path {
    let mut out = Vec::with_capacity(path.len() + 1);
    out.push(prefix.clone());
    out.extend_from_slice(path);
    out
}

/// Check if `parent` is a strict prefix of `child`.
///
/// ```
/// use tweak_tree_pointer::{is_child, PathSegment};
///
/// let parent = vec![PathSegment::from("a")];
/// let child = vec![PathSegment::from("a"), PathSegment::Index(3)];
/// assert!(is_child(&parent, &child));
/// assert!(!is_child(&child, &parent));
/// ```
pub fn is_child(parent: &[PathSegment], child: &[PathSegment]) -> bool {
    parent.len() < child.len() && child[..parent.len()] == *parent
}

/// The path without its last segment.
pub fn parent(path: &[PathSegment]) -> Result<&[PathSegment], PointerError> {
    match path.split_last() {
        Some((_, rest)) => Ok(rest),
        None => Err(PointerError::NoParent),
    }
}

/// Check if a token is a canonical non-negative array index.
pub fn is_valid_index(token: &str) -> bool {
    let bytes = token.as_bytes();
    if bytes.is_empty() || (bytes.len() > 1 && bytes[0] == b'0') {
        return false;
    }
    bytes.iter().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn escapes_round_trip_through_format_and_parse() {
        let path = vec![PathSegment::from("a/b"), PathSegment::from("~x"), PathSegment::Index(2)];
        let pointer = format_json_pointer(&path);
        assert_eq!(pointer, "/a~1b/~0x/2");
        assert_eq!(parse_json_pointer(&pointer).unwrap(), path);
    }

    #[test]
    fn leading_zero_tokens_stay_keys() {
        assert_eq!(parse_json_pointer("/007").unwrap(), vec![PathSegment::from("007")]);
        assert_eq!(parse_json_pointer("/0").unwrap(), vec![PathSegment::Index(0)]);
    }

    #[test]
    fn json_array_paths_keep_segment_kinds() {
        let path = path_from_json(&json!(["items", 3, "4"])).unwrap();
        assert_eq!(
            path,
            vec![PathSegment::from("items"), PathSegment::Index(3), PathSegment::from("4")]
        );
        assert_eq!(path_to_json(&path), json!(["items", 3, "4"]));
    }

    #[test]
    fn rejects_negative_and_non_scalar_segments() {
        assert_eq!(PathSegment::from_json(&json!(-1)), Err(PointerError::InvalidIndex));
        assert!(matches!(
            PathSegment::from_json(&json!({})),
            Err(PointerError::InvalidSegment(_))
        ));
    }

    #[test]
    fn parent_of_root_is_an_error() {
        assert_eq!(parent(&[]), Err(PointerError::NoParent));
        let path = vec![PathSegment::from("a"), PathSegment::Index(1)];
        assert_eq!(parent(&path).unwrap(), &[PathSegment::from("a")]);
    }
}
