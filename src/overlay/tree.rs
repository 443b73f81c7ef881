//! In-memory virtual output tree

use crate::error::GenerationError;
use crate::overlay::path::normalize_relative;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Overlay entry types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayEntry {
    Directory,
    File(Vec<u8>),
}

impl OverlayEntry {
    pub fn is_dir(&self) -> bool {
        matches!(self, OverlayEntry::Directory)
    }
}

/// Proposed output tree, rooted at the output directory.
///
/// Keys are normalized relative paths. `BTreeMap` ordering over path
/// components yields a pre-order walk: a directory sorts before everything
/// beneath it. Adding a file also adds its ancestor directories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlay {
    entries: BTreeMap<PathBuf, OverlayEntry>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory and its ancestors.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) -> Result<&mut Self, GenerationError> {
        let path = checked_path(path.as_ref())?;
        self.insert_ancestors(&path)?;
        match self.entries.get(&path) {
            Some(OverlayEntry::File(_)) => {
                return Err(conflict(&path, "a file already occupies this path"));
            }
            Some(OverlayEntry::Directory) => {}
            None => {
                self.entries.insert(path, OverlayEntry::Directory);
            }
        }
        Ok(self)
    }

    /// Add or replace a file, creating its ancestor directories.
    pub fn add_file(
        &mut self,
        path: impl AsRef<Path>,
        content: impl Into<Vec<u8>>,
    ) -> Result<&mut Self, GenerationError> {
        let path = checked_path(path.as_ref())?;
        self.insert_ancestors(&path)?;
        if let Some(OverlayEntry::Directory) = self.entries.get(&path) {
            return Err(conflict(&path, "a directory already occupies this path"));
        }
        self.entries.insert(path, OverlayEntry::File(content.into()));
        Ok(self)
    }

    fn insert_ancestors(&mut self, path: &Path) -> Result<(), GenerationError> {
        let mut ancestors: Vec<&Path> = path
            .ancestors()
            .skip(1)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        ancestors.reverse();
        for ancestor in ancestors {
            match self.entries.get(ancestor) {
                Some(OverlayEntry::File(_)) => {
                    return Err(conflict(path, "an ancestor of this path is a file"));
                }
                Some(OverlayEntry::Directory) => {}
                None => {
                    self.entries
                        .insert(ancestor.to_path_buf(), OverlayEntry::Directory);
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&OverlayEntry> {
        let path = normalize_relative(path.as_ref())?;
        self.entries.get(&path)
    }

    /// File content at `path`, if the overlay holds a file there.
    pub fn file(&self, path: impl AsRef<Path>) -> Option<&[u8]> {
        match self.get(path)? {
            OverlayEntry::File(content) => Some(content),
            OverlayEntry::Directory => None,
        }
    }

    /// Entries in pre-order.
    pub fn entries(&self) -> impl Iterator<Item = (&Path, &OverlayEntry)> {
        self.entries.iter().map(|(p, e)| (p.as_path(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.entries.values().filter(|e| !e.is_dir()).count()
    }

    pub fn dir_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_dir()).count()
    }

    /// Load a rendered directory as an overlay.
    ///
    /// For backends that render templates into scratch space. Symlinks are
    /// not followed.
    pub fn from_directory(root: &Path) -> Result<Self, GenerationError> {
        let mut overlay = Overlay::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .min_depth(1);

        for entry in walker {
            let entry = entry.map_err(|e| {
                GenerationError::Render(format!("Failed to walk {:?}: {}", root, e))
            })?;
            let relative = entry.path().strip_prefix(root).map_err(|e| {
                GenerationError::Render(format!("Failed to relativize {:?}: {}", entry.path(), e))
            })?;

            let file_type = entry.file_type();
            if file_type.is_dir() {
                overlay.add_dir(relative)?;
            } else if file_type.is_file() {
                let content = std::fs::read(entry.path()).map_err(|e| {
                    GenerationError::Render(format!("Failed to read {:?}: {}", entry.path(), e))
                })?;
                overlay.add_file(relative, content)?;
            }
        }

        Ok(overlay)
    }
}

fn checked_path(path: &Path) -> Result<PathBuf, GenerationError> {
    normalize_relative(path).ok_or_else(|| GenerationError::InvalidOverlay {
        path: path.to_path_buf(),
        reason: "path must be relative, non-empty and stay inside the output root".to_string(),
    })
}

fn conflict(path: &Path, reason: &str) -> GenerationError {
    GenerationError::InvalidOverlay {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
