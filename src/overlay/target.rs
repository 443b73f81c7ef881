//! Output directory seam
//!
//! Generators see the output directory through [`OutputView`]; only the merge
//! step holds an [`OutputTarget`] and writes through it.

use crate::error::MergeError;
use crate::overlay::path::stays_under_root;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::NamedTempFile;

/// Read-only view of the current output directory.
///
/// All paths are relative to the output root.
pub trait OutputView: Send + Sync {
    /// Root the view is anchored at, for diagnostics
    fn root(&self) -> &Path;

    /// Whether anything (file or directory) exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// File content at `path`; `Ok(None)` when nothing is there.
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>>;
}

/// Writable output directory used by the merge step.
pub trait OutputTarget: OutputView {
    /// Create a directory and any missing ancestors.
    fn create_dir_all(&self, path: &Path) -> Result<(), MergeError>;

    /// Replace the full content of a file. Readers observe either the old or
    /// the new content, never a partial write.
    fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), MergeError>;
}

/// Output target backed by a real directory
#[derive(Debug, Clone)]
pub struct FsTarget {
    root: PathBuf,
}

/// Mode for newly created files: private, non-executable
pub const NEW_FILE_MODE: u32 = 0o600;

impl FsTarget {
    /// Anchor at an existing or not-yet-created directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self { root }
    }

    /// Anchor at `root`, creating it first if needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, MergeError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| MergeError::CreateDir {
            path: root.clone(),
            source,
        })?;
        Ok(Self::new(root))
    }

    /// Join `path` onto the root.
    ///
    /// Rejects `..` and absolute paths, and any existing symlink along the
    /// way whose target lies outside the root. A dangling symlink counts as
    /// outside.
    fn resolve(&self, path: &Path) -> Result<PathBuf, MergeError> {
        let escapes = || MergeError::PathEscapesRoot {
            path: path.to_path_buf(),
        };
        if !stays_under_root(path) {
            return Err(escapes());
        }

        let root = dunce::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());
        let mut current = self.root.clone();
        for component in path.components() {
            current.push(component);
            match fs::symlink_metadata(&current) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    let inside = dunce::canonicalize(&current)
                        .map(|resolved| resolved.starts_with(&root))
                        .unwrap_or(false);
                    if !inside {
                        return Err(escapes());
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
        Ok(current)
    }
}

impl OutputView for FsTarget {
    fn root(&self) -> &Path {
        &self.root
    }

    fn exists(&self, path: &Path) -> bool {
        match self.resolve(path) {
            Ok(full) => fs::symlink_metadata(full).is_ok(),
            Err(_) => false,
        }
    }

    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        let full = self
            .resolve(path)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        match fs::read(full) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl OutputTarget for FsTarget {
    fn create_dir_all(&self, path: &Path) -> Result<(), MergeError> {
        let full = self.resolve(path)?;
        fs::create_dir_all(&full).map_err(|source| MergeError::CreateDir {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), MergeError> {
        let full = self.resolve(path)?;
        write_atomic(&full, content).map_err(|source| MergeError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Write to a uniquely named temp file next to `dest`, then persist it over
/// the destination.
///
/// An existing file keeps its permissions; a new file gets [`NEW_FILE_MODE`].
/// The temp file is removed if any step fails.
fn write_atomic(dest: &Path, content: &[u8]) -> io::Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    let existing_permissions = fs::metadata(dest).ok().map(|m| m.permissions());

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    match existing_permissions {
        Some(permissions) => temp.as_file().set_permissions(permissions)?,
        None => set_new_file_mode(temp.as_file())?,
    }
    temp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn set_new_file_mode(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(NEW_FILE_MODE))
}

#[cfg(not(unix))]
fn set_new_file_mode(_file: &fs::File) -> io::Result<()> {
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MemoryEntry {
    Directory,
    File(Vec<u8>),
}

/// In-memory directory state.
///
/// Behaves like a filesystem for the merge step (a file write needs its parent
/// directory) and counts every mutation, so merges can be checked without
/// touching disk.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    root: PathBuf,
    entries: RwLock<BTreeMap<PathBuf, MemoryEntry>>,
    dirs_created: AtomicUsize,
    files_written: AtomicUsize,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("memory://"),
            ..Self::default()
        }
    }

    /// Seed a file (and its ancestors) without counting it as a write.
    pub fn with_file(self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> Self {
        let path = path.as_ref().to_path_buf();
        {
            let mut entries = self.entries.write();
            insert_dirs(&mut entries, path.parent().unwrap_or(Path::new("")));
            entries.insert(path, MemoryEntry::File(content.into()));
        }
        self
    }

    /// Seed a directory (and its ancestors) without counting it.
    pub fn with_dir(self, path: impl AsRef<Path>) -> Self {
        insert_dirs(&mut self.entries.write(), path.as_ref());
        self
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.entries.read().get(path.as_ref()) {
            Some(MemoryEntry::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    pub fn is_dir(&self, path: impl AsRef<Path>) -> bool {
        matches!(
            self.entries.read().get(path.as_ref()),
            Some(MemoryEntry::Directory)
        )
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn dirs_created(&self) -> usize {
        self.dirs_created.load(Ordering::SeqCst)
    }

    pub fn files_written(&self) -> usize {
        self.files_written.load(Ordering::SeqCst)
    }
}

fn insert_dirs(entries: &mut BTreeMap<PathBuf, MemoryEntry>, path: &Path) -> usize {
    let mut created = 0;
    let mut ancestors: Vec<&Path> = path
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .collect();
    ancestors.reverse();
    for ancestor in ancestors {
        if !entries.contains_key(ancestor) {
            entries.insert(ancestor.to_path_buf(), MemoryEntry::Directory);
            created += 1;
        }
    }
    created
}

impl OutputView for MemoryTarget {
    fn root(&self) -> &Path {
        &self.root
    }

    fn exists(&self, path: &Path) -> bool {
        self.entries.read().contains_key(path)
    }

    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        match self.entries.read().get(path) {
            Some(MemoryEntry::File(content)) => Ok(Some(content.clone())),
            Some(MemoryEntry::Directory) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{:?} is a directory", path),
            )),
            None => Ok(None),
        }
    }
}

impl OutputTarget for MemoryTarget {
    fn create_dir_all(&self, path: &Path) -> Result<(), MergeError> {
        if !stays_under_root(path) {
            return Err(MergeError::PathEscapesRoot {
                path: path.to_path_buf(),
            });
        }
        let mut entries = self.entries.write();
        if let Some(MemoryEntry::File(_)) = entries.get(path) {
            return Err(MergeError::CreateDir {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::AlreadyExists, "a file exists at this path"),
            });
        }
        if insert_dirs(&mut entries, path) > 0 {
            self.dirs_created.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), MergeError> {
        if !stays_under_root(path) {
            return Err(MergeError::PathEscapesRoot {
                path: path.to_path_buf(),
            });
        }
        let mut entries = self.entries.write();
        let parent_ok = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                matches!(entries.get(parent), Some(MemoryEntry::Directory))
            }
            _ => true,
        };
        if !parent_ok {
            return Err(MergeError::Write {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "parent directory does not exist"),
            });
        }
        if let Some(MemoryEntry::Directory) = entries.get(path) {
            return Err(MergeError::Write {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::Other, "a directory exists at this path"),
            });
        }
        entries.insert(path.to_path_buf(), MemoryEntry::File(content.to_vec()));
        self.files_written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
