// src/store/path_utils.rs

//! Utility functions for relating event paths to the watched directory.

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again. Deleted files cannot be
///   canonicalized, so only their parent is.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    // Fast path: event path already starts with our root.
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    // macOS reports /private/var/... for /var/...; compare canonical forms.
    let root_canon = root.canonicalize().ok()?;
    let path_canon = path.canonicalize().ok().or_else(|| {
        let parent = path.parent()?.canonicalize().ok()?;
        Some(parent.join(path.file_name()?))
    })?;

    path_canon
        .strip_prefix(&root_canon)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

/// Returns the file name of `path` if it sits directly inside `root`.
///
/// Paths in nested directories yield `None`: the watched directory is flat.
pub fn direct_child_name(root: &Path, path: &Path) -> Option<String> {
    let rel = relative_str(root, path)?;
    if rel.is_empty() || rel.contains('/') {
        return None;
    }
    Some(rel)
}
