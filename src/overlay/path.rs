//! Overlay path normalization

use std::path::{Component, Path, PathBuf};

/// Normalize an overlay-relative path.
///
/// Drops `.` components and keeps every other component byte for byte, so
/// the merge writes exactly the name the backend asked for. Returns `None`
/// for empty paths and for anything that could leave the output root
/// (absolute paths, prefixes, `..`).
pub fn normalize_relative(path: &Path) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => normalized.push(name),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if normalized.as_os_str().is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Whether `path` only contains components that stay under a root.
pub fn stays_under_root(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Render a relative path with `/` separators for the merge log.
pub fn display_relative(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}
