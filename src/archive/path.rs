// src/archive/path.rs

//! Entry name handling for archive extraction and packing
//!
//! Archive entry names come from an external artifact and are treated as
//! untrusted: an entry must never be written outside the extraction root.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Sanitize an archive entry name into a relative path
///
/// - Back-slashes are treated as separators
/// - Leading slashes and `.` components are dropped
/// - Any `..` component is rejected
/// - Names that are empty after sanitization are rejected
///
/// # Examples
///
/// ```
/// use ctorgraft::archive::path::sanitize_entry_name;
/// use std::path::PathBuf;
///
/// assert_eq!(
///     sanitize_entry_name("org/example/Widget.java").unwrap(),
///     PathBuf::from("org/example/Widget.java")
/// );
/// assert!(sanitize_entry_name("../../etc/passwd").is_err());
/// ```
pub fn sanitize_entry_name(name: &str) -> Result<PathBuf> {
    let unified = name.replace('\\', "/");
    let relative = unified.trim_start_matches('/');

    let mut normalized = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir => {}
            Component::ParentDir => return Err(Error::PathTraversal(name.to_string())),
            Component::Prefix(_) | Component::RootDir => {
                return Err(Error::PathTraversal(name.to_string()));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath(format!("empty archive entry name '{}'", name)));
    }

    Ok(normalized)
}

/// Join an untrusted entry name onto the extraction root
pub fn safe_join(root: &Path, name: &str) -> Result<PathBuf> {
    Ok(root.join(sanitize_entry_name(name)?))
}

/// POSIX-style entry name of `path` relative to `root`
pub fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        Error::InvalidPath(format!("{} is not under {}", path.display(), root.display()))
    })?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(c) => parts.push(c.to_string_lossy().replace('\\', "/")),
            Component::CurDir => {}
            _ => return Err(Error::InvalidPath(relative.display().to_string())),
        }
    }

    if parts.is_empty() {
        return Err(Error::InvalidPath(format!("{} is the root itself", path.display())));
    }
    Ok(parts.join("/"))
}
