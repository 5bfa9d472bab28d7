//! File-based storage backend for persistent storage.

use crate::backend::{normalize, StorageBackend};
use crate::error::{StorageError, StorageResult};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A directory-rooted storage backend.
///
/// This backend provides persistent storage using OS file APIs.
/// Data survives process restarts.
///
/// # Durability
///
/// `write` uses the write-then-rename pattern:
/// 1. Write to `<name>.tmp` next to the target
/// 2. Sync the temporary file (when `sync_writes` is enabled)
/// 3. Rename the temporary file over the target
/// 4. Fsync the parent directory (when `sync_writes` is enabled)
///
/// A crash therefore leaves either the old or the new file, never a torn one.
///
/// # Example
///
/// ```no_run
/// use recdb_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open_with_create_dirs(Path::new("databases/shop")).unwrap();
/// backend.write(Path::new("schema.txt"), b"[users]\n").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
    sync_writes: bool,
}

impl FileBackend {
    /// Opens a backend rooted at an existing directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if `root` is not a directory.
    pub fn open(root: &Path) -> StorageResult<Self> {
        if !root.is_dir() {
            return Err(StorageError::not_found(root));
        }
        Ok(Self {
            root: root.to_path_buf(),
            sync_writes: true,
        })
    }

    /// Opens a backend, creating the root directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open_with_create_dirs(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        Self::open(root)
    }

    /// Sets whether writes are fsynced before being renamed into place.
    #[must_use]
    pub const fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> StorageResult<PathBuf> {
        Ok(self.root.join(normalize(path)?))
    }

    /// Syncs a directory so renames and removals inside it are durable.
    #[cfg(unix)]
    fn sync_directory(&self, dir: &Path) -> StorageResult<()> {
        if self.sync_writes {
            File::open(dir)?.sync_all()?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self, _dir: &Path) -> StorageResult<()> {
        // NTFS journals metadata; directory handles cannot be fsynced
        Ok(())
    }
}

fn map_not_found(err: io::Error, path: &Path) -> StorageError {
    if err.kind() == io::ErrorKind::NotFound {
        StorageError::not_found(path)
    } else {
        StorageError::Io(err)
    }
}

fn temp_path(full: &Path) -> PathBuf {
    let mut name = full
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".tmp");
    full.with_file_name(name)
}

impl StorageBackend for FileBackend {
    fn read(&self, path: &Path) -> StorageResult<Option<Vec<u8>>> {
        let full = self.resolve(path)?;
        match fs::read(&full) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let full = self.resolve(path)?;
        if full == self.root {
            return Err(StorageError::InvalidPath {
                path: path.to_path_buf(),
            });
        }
        let parent = full.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&parent)?;

        let temp = temp_path(&full);
        let mut file = File::create(&temp)?;
        file.write_all(data)?;
        if self.sync_writes {
            file.sync_all()?;
        }
        drop(file);

        fs::rename(&temp, &full)?;
        self.sync_directory(&parent)
    }

    fn remove_file(&self, path: &Path) -> StorageResult<()> {
        let full = self.resolve(path)?;
        fs::remove_file(&full).map_err(|e| map_not_found(e, path))?;
        if let Some(parent) = full.parent() {
            self.sync_directory(parent)?;
        }
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        let full = self.resolve(path)?;
        fs::create_dir_all(full)?;
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> StorageResult<()> {
        let full = self.resolve(path)?;
        if !full.is_dir() {
            return Err(StorageError::not_found(path));
        }
        fs::remove_dir_all(&full)?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        if !source.exists() {
            return Err(StorageError::not_found(from));
        }
        if target.exists() {
            return Err(StorageError::already_exists(to));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&source, &target)?;
        if let Some(parent) = target.parent() {
            self.sync_directory(parent)?;
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> StorageResult<bool> {
        Ok(self.resolve(path)?.exists())
    }

    fn is_dir(&self, path: &Path) -> StorageResult<bool> {
        Ok(self.resolve(path)?.is_dir())
    }

    fn list(&self, dir: &Path) -> StorageResult<Vec<String>> {
        let full = self.resolve(dir)?;
        let entries = fs::read_dir(&full).map_err(|e| map_not_found(e, dir))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}
