//! Storage backend trait definition.

use crate::error::{StorageError, StorageResult};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// A path-keyed storage backend for RecDB.
///
/// A backend is rooted at a directory and every path it receives is relative
/// to that root. Files are opaque byte blobs that are always read and written
/// whole.
///
/// # Invariants
///
/// - `write` replaces the file as a unit and creates missing parent directories
/// - `read` returns exactly the bytes of the last successful `write`
/// - `list` returns the names of direct children, sorted
/// - Backends must be `Send + Sync`
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads a whole file.
    ///
    /// Returns `None` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid, names a directory, or an
    /// I/O error occurs.
    fn read(&self, path: &Path) -> StorageResult<Option<Vec<u8>>>;

    /// Replaces the contents of a file, creating it and its parents if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or an I/O error occurs.
    fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()>;

    /// Removes a file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the file does not exist.
    fn remove_file(&self, path: &Path) -> StorageResult<()>;

    /// Creates a directory and all of its missing parents.
    ///
    /// Succeeds if the directory already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or an I/O error occurs.
    fn create_dir_all(&self, path: &Path) -> StorageResult<()>;

    /// Removes a directory and everything below it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the directory does not exist.
    fn remove_dir_all(&self, path: &Path) -> StorageResult<()>;

    /// Moves a file or directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if `from` does not exist and
    /// [`StorageError::AlreadyExists`] if `to` does.
    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()>;

    /// Returns true if a file or directory exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid.
    fn exists(&self, path: &Path) -> StorageResult<bool>;

    /// Returns true if `path` is an existing directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid.
    fn is_dir(&self, path: &Path) -> StorageResult<bool>;

    /// Lists the names of the direct children of a directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the directory does not exist.
    fn list(&self, dir: &Path) -> StorageResult<Vec<String>>;
}

impl<T: StorageBackend + ?Sized> StorageBackend for Arc<T> {
    fn read(&self, path: &Path) -> StorageResult<Option<Vec<u8>>> {
        (**self).read(path)
    }

    fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        (**self).write(path, data)
    }

    fn remove_file(&self, path: &Path) -> StorageResult<()> {
        (**self).remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        (**self).create_dir_all(path)
    }

    fn remove_dir_all(&self, path: &Path) -> StorageResult<()> {
        (**self).remove_dir_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        (**self).rename(from, to)
    }

    fn exists(&self, path: &Path) -> StorageResult<bool> {
        (**self).exists(path)
    }

    fn is_dir(&self, path: &Path) -> StorageResult<bool> {
        (**self).is_dir(path)
    }

    fn list(&self, dir: &Path) -> StorageResult<Vec<String>> {
        (**self).list(dir)
    }
}

/// Normalizes a relative path, dropping `.` components.
///
/// The empty path names the backend root.
///
/// # Errors
///
/// Returns [`StorageError::InvalidPath`] for absolute paths, prefixes and
/// `..` components.
pub fn normalize(path: &Path) -> StorageResult<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::InvalidPath {
                    path: path.to_path_buf(),
                });
            }
        }
    }
    Ok(out)
}
