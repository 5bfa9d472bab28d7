//! Backend view restricted to a subdirectory of another backend.

use crate::backend::{normalize, StorageBackend};
use crate::error::{StorageError, StorageResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A backend whose root is a subdirectory of an inner backend.
///
/// Every path is joined onto `prefix` before reaching the inner backend, and
/// errors are reported with the prefix stripped again. A catalog of
/// databases uses this to hand each database its own rooted view.
#[derive(Clone)]
pub struct ScopedBackend {
    inner: Arc<dyn StorageBackend>,
    prefix: PathBuf,
}

impl ScopedBackend {
    /// Creates a view of `inner` rooted at `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidPath`] if `prefix` is not a plain
    /// relative path.
    pub fn new(inner: Arc<dyn StorageBackend>, prefix: &Path) -> StorageResult<Self> {
        Ok(Self {
            inner,
            prefix: normalize(prefix)?,
        })
    }

    /// Returns the prefix inside the inner backend.
    #[must_use]
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    fn scope(&self, path: &Path) -> StorageResult<PathBuf> {
        Ok(self.prefix.join(normalize(path)?))
    }

    fn unscope(&self, err: StorageError) -> StorageError {
        let strip = |path: PathBuf| {
            path.strip_prefix(&self.prefix)
                .map(Path::to_path_buf)
                .unwrap_or(path)
        };
        match err {
            StorageError::NotFound { path } => StorageError::NotFound { path: strip(path) },
            StorageError::AlreadyExists { path } => StorageError::AlreadyExists {
                path: strip(path),
            },
            other => other,
        }
    }
}

impl std::fmt::Debug for ScopedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedBackend")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl StorageBackend for ScopedBackend {
    fn read(&self, path: &Path) -> StorageResult<Option<Vec<u8>>> {
        self.inner.read(&self.scope(path)?).map_err(|e| self.unscope(e))
    }

    fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        self.inner
            .write(&self.scope(path)?, data)
            .map_err(|e| self.unscope(e))
    }

    fn remove_file(&self, path: &Path) -> StorageResult<()> {
        self.inner
            .remove_file(&self.scope(path)?)
            .map_err(|e| self.unscope(e))
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        self.inner
            .create_dir_all(&self.scope(path)?)
            .map_err(|e| self.unscope(e))
    }

    fn remove_dir_all(&self, path: &Path) -> StorageResult<()> {
        self.inner
            .remove_dir_all(&self.scope(path)?)
            .map_err(|e| self.unscope(e))
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        self.inner
            .rename(&self.scope(from)?, &self.scope(to)?)
            .map_err(|e| self.unscope(e))
    }

    fn exists(&self, path: &Path) -> StorageResult<bool> {
        self.inner.exists(&self.scope(path)?)
    }

    fn is_dir(&self, path: &Path) -> StorageResult<bool> {
        self.inner.is_dir(&self.scope(path)?)
    }

    fn list(&self, dir: &Path) -> StorageResult<Vec<String>> {
        self.inner.list(&self.scope(dir)?).map_err(|e| self.unscope(e))
    }
}
