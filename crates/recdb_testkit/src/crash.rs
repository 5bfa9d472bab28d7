//! Crash simulation for RecDB.
//!
//! Every record mutation is two file operations: the intent written to
//! `pending.txt`, then the record file itself. [`CrashableBackend`] fails
//! every mutating operation after a configured count, which leaves the
//! database exactly as a process killed between the two would.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recdb_testkit::crash::CrashableBackend;
//!
//! let backend = Arc::new(CrashableBackend::new(Arc::new(InMemoryBackend::new())));
//! // ... create the database and schema ...
//! backend.crash_after(1); // intent lands, record write fails
//! assert!(db.insert("users", &fields).is_err());
//! backend.reset();
//! db.replay()?;
//! ```

use recdb_storage::{StorageBackend, StorageError, StorageResult};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A storage backend wrapper that can simulate crashes.
///
/// Reads always succeed. Mutating operations (`write`, `remove_file`,
/// `create_dir_all`, `remove_dir_all`, `rename`) are counted; once the count
/// reaches the threshold they fail with an I/O error and change nothing.
pub struct CrashableBackend {
    inner: Arc<dyn StorageBackend>,
    crash_after_ops: AtomicUsize,
    ops: AtomicUsize,
    crashed: AtomicBool,
}

impl CrashableBackend {
    /// Creates a new crashable backend wrapping an inner backend.
    pub fn new(inner: Arc<dyn StorageBackend>) -> Self {
        Self {
            inner,
            crash_after_ops: AtomicUsize::new(usize::MAX),
            ops: AtomicUsize::new(0),
            crashed: AtomicBool::new(false),
        }
    }

    /// Lets `ops` more mutating operations through, then fails the rest.
    pub fn crash_after(&self, ops: usize) {
        self.ops.store(0, Ordering::SeqCst);
        self.crash_after_ops.store(ops, Ordering::SeqCst);
    }

    /// Resets the crash state.
    pub fn reset(&self) {
        self.crash_after_ops.store(usize::MAX, Ordering::SeqCst);
        self.ops.store(0, Ordering::SeqCst);
        self.crashed.store(false, Ordering::SeqCst);
    }

    /// Returns whether the backend has failed an operation.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Returns the wrapped backend.
    pub fn inner(&self) -> &Arc<dyn StorageBackend> {
        &self.inner
    }

    fn mutate(&self, op: &str, path: &Path) -> StorageResult<()> {
        let current = self.ops.fetch_add(1, Ordering::SeqCst);
        if current >= self.crash_after_ops.load(Ordering::SeqCst) {
            self.crashed.store(true, Ordering::SeqCst);
            return Err(StorageError::Io(std::io::Error::other(format!(
                "simulated crash during {op} of {}",
                path.display()
            ))));
        }
        Ok(())
    }
}

impl StorageBackend for CrashableBackend {
    fn read(&self, path: &Path) -> StorageResult<Option<Vec<u8>>> {
        self.inner.read(path)
    }

    fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        self.mutate("write", path)?;
        self.inner.write(path, data)
    }

    fn remove_file(&self, path: &Path) -> StorageResult<()> {
        self.mutate("remove_file", path)?;
        self.inner.remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        self.mutate("create_dir_all", path)?;
        self.inner.create_dir_all(path)
    }

    fn remove_dir_all(&self, path: &Path) -> StorageResult<()> {
        self.mutate("remove_dir_all", path)?;
        self.inner.remove_dir_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        self.mutate("rename", from)?;
        self.inner.rename(from, to)
    }

    fn exists(&self, path: &Path) -> StorageResult<bool> {
        self.inner.exists(path)
    }

    fn is_dir(&self, path: &Path) -> StorageResult<bool> {
        self.inner.is_dir(path)
    }

    fn list(&self, dir: &Path) -> StorageResult<Vec<String>> {
        self.inner.list(dir)
    }
}

impl std::fmt::Debug for CrashableBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashableBackend")
            .field("ops", &self.ops.load(Ordering::SeqCst))
            .field("crashed", &self.has_crashed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recdb_storage::InMemoryBackend;

    #[test]
    fn fails_after_threshold() {
        let backend = CrashableBackend::new(Arc::new(InMemoryBackend::new()));
        backend.crash_after(1);

        backend.write(Path::new("a"), b"1").unwrap();
        let err = backend.write(Path::new("b"), b"2").unwrap_err();

        assert!(matches!(err, StorageError::Io(_)));
        assert!(backend.has_crashed());
        assert!(backend.exists(Path::new("a")).unwrap());
        assert!(!backend.exists(Path::new("b")).unwrap());
    }

    #[test]
    fn reset_restores_writes() {
        let backend = CrashableBackend::new(Arc::new(InMemoryBackend::new()));
        backend.crash_after(0);
        assert!(backend.create_dir_all(Path::new("d")).is_err());

        backend.reset();

        assert!(!backend.has_crashed());
        backend.create_dir_all(Path::new("d")).unwrap();
        assert!(backend.is_dir(Path::new("d")).unwrap());
    }
}
