//! Object key validation.
//!
//! Keys arrive from the outside world (broker messages, provider
//! notifications) and are joined onto backend roots, so they must never be
//! able to climb out of the library they name.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates an object key and returns it in normalized, relative form.
///
/// Leading slashes are dropped (`/a.txt` and `a.txt` name the same object),
/// `.` segments and repeated separators disappear, and `..` is resolved as
/// long as it never leaves the library root. Null bytes are rejected.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use maw_storage::validate_path;
/// assert_eq!(validate_path("/reports/2024/q1.pdf").unwrap(), Path::new("reports/2024/q1.pdf"));
/// assert_eq!(validate_path("a/../b.txt").unwrap(), Path::new("b.txt"));
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a\0b").is_err());
/// assert!(validate_path("/").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes survive Path::components() on Unix but truncate
                // the path as soon as it reaches a syscall.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}
