//! In-memory storage backend for testing.

use crate::backend::{normalize, StorageBackend};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
struct Tree {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
}

impl Tree {
    fn is_dir(&self, path: &Path) -> bool {
        path.as_os_str().is_empty() || self.dirs.contains(path)
    }

    fn add_dir_chain(&mut self, path: &Path) {
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            self.dirs.insert(current.clone());
        }
    }
}

/// An in-memory storage backend.
///
/// This backend keeps a file tree in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral databases that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use recdb_storage::{StorageBackend, InMemoryBackend};
/// use std::path::Path;
///
/// let backend = InMemoryBackend::new();
/// backend.write(Path::new("pending.txt"), b"").unwrap();
/// assert!(backend.exists(Path::new("pending.txt")).unwrap());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    tree: RwLock<Tree>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored file path, sorted.
    ///
    /// Useful for asserting on the exact on-disk footprint in tests.
    #[must_use]
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.tree.read().files.keys().cloned().collect()
    }

    /// Returns a copy of every stored file.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        self.tree.read().files.clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read(&self, path: &Path) -> StorageResult<Option<Vec<u8>>> {
        let path = normalize(path)?;
        let tree = self.tree.read();
        if tree.is_dir(&path) {
            return Err(StorageError::InvalidPath { path });
        }
        Ok(tree.files.get(&path).cloned())
    }

    fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let path = normalize(path)?;
        let mut tree = self.tree.write();
        if tree.is_dir(&path) {
            return Err(StorageError::InvalidPath { path });
        }
        if let Some(parent) = path.parent() {
            tree.add_dir_chain(parent);
        }
        tree.files.insert(path, data.to_vec());
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> StorageResult<()> {
        let path = normalize(path)?;
        let mut tree = self.tree.write();
        match tree.files.remove(&path) {
            Some(_) => Ok(()),
            None => Err(StorageError::not_found(path)),
        }
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        let path = normalize(path)?;
        let mut tree = self.tree.write();
        if tree.files.contains_key(&path) {
            return Err(StorageError::already_exists(path));
        }
        tree.add_dir_chain(&path);
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> StorageResult<()> {
        let path = normalize(path)?;
        let mut tree = self.tree.write();
        if !tree.dirs.contains(&path) {
            return Err(StorageError::not_found(path));
        }
        tree.files.retain(|p, _| !p.starts_with(&path));
        tree.dirs.retain(|p| !p.starts_with(&path));
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        let from = normalize(from)?;
        let to = normalize(to)?;
        let mut tree = self.tree.write();

        if tree.files.contains_key(&to) || tree.is_dir(&to) {
            return Err(StorageError::already_exists(to));
        }

        if let Some(data) = tree.files.remove(&from) {
            if let Some(parent) = to.parent() {
                tree.add_dir_chain(parent);
            }
            tree.files.insert(to, data);
            return Ok(());
        }

        if !tree.dirs.contains(&from) {
            return Err(StorageError::not_found(from));
        }

        let moved_files: Vec<(PathBuf, Vec<u8>)> = tree
            .files
            .iter()
            .filter(|(p, _)| p.starts_with(&from))
            .map(|(p, d)| (p.clone(), d.clone()))
            .collect();
        let moved_dirs: Vec<PathBuf> = tree
            .dirs
            .iter()
            .filter(|p| p.starts_with(&from))
            .cloned()
            .collect();

        tree.files.retain(|p, _| !p.starts_with(&from));
        tree.dirs.retain(|p| !p.starts_with(&from));
        tree.add_dir_chain(&to);

        for dir in moved_dirs {
            if let Ok(rest) = dir.strip_prefix(&from) {
                tree.dirs.insert(to.join(rest));
            }
        }
        for (file, data) in moved_files {
            if let Ok(rest) = file.strip_prefix(&from) {
                tree.files.insert(to.join(rest), data);
            }
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> StorageResult<bool> {
        let path = normalize(path)?;
        let tree = self.tree.read();
        Ok(tree.is_dir(&path) || tree.files.contains_key(&path))
    }

    fn is_dir(&self, path: &Path) -> StorageResult<bool> {
        let path = normalize(path)?;
        Ok(self.tree.read().is_dir(&path))
    }

    fn list(&self, dir: &Path) -> StorageResult<Vec<String>> {
        let dir = normalize(dir)?;
        let tree = self.tree.read();
        if !tree.is_dir(&dir) {
            return Err(StorageError::not_found(dir));
        }

        let child_name = |p: &PathBuf| -> Option<String> {
            if p.parent() == Some(dir.as_path()) {
                p.file_name().map(|n| n.to_string_lossy().into_owned())
            } else {
                None
            }
        };

        let names: BTreeSet<String> = tree
            .files
            .keys()
            .filter_map(child_name)
            .chain(tree.dirs.iter().filter_map(child_name))
            .collect();
        Ok(names.into_iter().collect())
    }
}
