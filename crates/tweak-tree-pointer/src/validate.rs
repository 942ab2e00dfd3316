//! Validation for pointer strings and segment paths.

use thiserror::Error;

use crate::PathSegment;

/// Maximum allowed pointer string length.
const MAX_POINTER_LENGTH: usize = 1024;

/// Maximum allowed path depth.
const MAX_PATH_LENGTH: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("POINTER_INVALID")]
    PointerInvalid,
    #[error("POINTER_TOO_LONG")]
    PointerTooLong,
    #[error("PATH_TOO_LONG")]
    PathTooLong,
}

/// Validate a pointer string: empty, or `/`-prefixed and at most 1024 bytes.
///
/// ```
/// use tweak_tree_pointer::validate_json_pointer;
///
/// validate_json_pointer("").unwrap();
/// validate_json_pointer("/foo/bar").unwrap();
/// validate_json_pointer("foo").unwrap_err();
/// ```
pub fn validate_json_pointer(pointer: &str) -> Result<(), ValidationError> {
    if pointer.is_empty() {
        return Ok(());
    }
    if !pointer.starts_with('/') {
        return Err(ValidationError::PointerInvalid);
    }
    if pointer.len() > MAX_POINTER_LENGTH {
        return Err(ValidationError::PointerTooLong);
    }
    Ok(())
}

/// Validate a segment path: at most 256 segments deep.
pub fn validate_path(path: &[PathSegment]) -> Result<(), ValidationError> {
    if path.len() > MAX_PATH_LENGTH {
        return Err(ValidationError::PathTooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_long_pointer() {
        let pointer = format!("/{}", "a".repeat(MAX_POINTER_LENGTH));
        assert_eq!(validate_json_pointer(&pointer), Err(ValidationError::PointerTooLong));
    }

    #[test]
    fn too_deep_path() {
        let path = vec![PathSegment::Index(0); MAX_PATH_LENGTH + 1];
        assert_eq!(validate_path(&path), Err(ValidationError::PathTooLong));
        assert!(validate_path(&path[..MAX_PATH_LENGTH]).is_ok());
    }
}
