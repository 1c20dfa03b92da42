//! core::paths
//!
//! Validation and normalization of repository-relative file paths.
//!
//! Every path queued on a [`Batch`](crate::batch::Batch) goes through
//! [`clean`] before it is stored, so the tree entries sent to the object
//! store are always forward-slash separated, relative, and free of
//! traversal segments.
//!
//! # Rules
//!
//! - Any `..` segment (split on `/` or `\`) is a traversal attempt.
//! - ASCII control characters (including NUL) are invalid.
//! - Backslashes become forward slashes.
//! - Empty and `.` segments are dropped, so `//a/./b/` becomes `a/b`.
//! - The root (`""`, `"."`, `"/"`) normalizes to the empty string. It is a
//!   valid path here; the batch layer decides whether it is a usable target.
//!
//! # Example
//!
//! ```
//! use ghbatch::core::paths::{clean, normalize, PathError};
//!
//! assert_eq!(normalize("\\docs\\\\guide.md"), "docs/guide.md");
//! assert_eq!(clean("./src//lib.rs").unwrap(), "src/lib.rs");
//! assert!(matches!(clean("../etc/passwd"), Err(PathError::Traversal(_))));
//! ```

use thiserror::Error;

/// Errors from path validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    /// The path contains a parent-directory segment.
    #[error("path traversal not allowed: {0:?}")]
    Traversal(String),

    /// The path is structurally invalid (e.g., contains control characters).
    #[error("invalid path: {0:?}")]
    Invalid(String),
}

/// Check a path for traversal segments and invalid characters.
///
/// Separators are not normalized first: both `/` and `\` delimit segments.
///
/// # Errors
///
/// - `PathError::Traversal` if any segment is `..`
/// - `PathError::Invalid` if the path contains an ASCII control character
pub fn validate(path: &str) -> Result<(), PathError> {
    if path.chars().any(|c| c.is_ascii_control()) {
        return Err(PathError::Invalid(path.to_string()));
    }
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(PathError::Traversal(path.to_string()));
    }
    Ok(())
}

/// Normalize separators and redundant segments.
///
/// This does not validate; call [`validate`] (or use [`clean`]) first.
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Validate then normalize a path.
///
/// # Errors
///
/// Same as [`validate`].
pub fn clean(path: &str) -> Result<String, PathError> {
    validate(path)?;
    Ok(normalize(path))
}
