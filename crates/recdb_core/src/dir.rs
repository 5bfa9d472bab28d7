//! Database directory layout.
//!
//! Every database lives in its own directory:
//!
//! ```text
//! <db>/
//! ├─ schema.txt            # [Table] sections of field definitions
//! ├─ pending.txt           # Single-slot recovery log (JSON or empty)
//! ├─ cache.txt             # Select-result cache (JSON array)
//! └─ data/
//!    └─ <table>/
//!       └─ <id>.json       # One record per file
//! ```
//!
//! `DatabaseDir` is the only place that knows these names. Every other
//! component asks it for paths and goes through its read/write helpers.

use crate::error::{CoreError, CoreResult, ValidationError};
use recdb_storage::StorageBackend;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File names within the database directory.
const SCHEMA_FILE: &str = "schema.txt";
const PENDING_FILE: &str = "pending.txt";
const CACHE_FILE: &str = "cache.txt";
const DATA_DIR: &str = "data";
const RECORD_EXTENSION: &str = "json";

/// Checks that a table, database or record name is usable on disk and in the
/// schema text.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyName`] or [`ValidationError::InvalidName`].
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let forbidden = |c: char| c.is_whitespace() || matches!(c, '[' | ']' | '/' | '\\' | ':' | '.' | ',');
    if name.chars().any(forbidden) {
        return Err(ValidationError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// A handle on one database directory inside a storage backend.
///
/// Cloning is cheap; clones share the backend.
#[derive(Clone)]
pub struct DatabaseDir {
    name: String,
    backend: Arc<dyn StorageBackend>,
}

impl DatabaseDir {
    /// Wraps a backend rooted at the database directory.
    pub fn new(name: impl Into<String>, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }

    /// Returns the database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the underlying backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Returns the path to the schema file.
    #[must_use]
    pub fn schema_path(&self) -> PathBuf {
        PathBuf::from(SCHEMA_FILE)
    }

    /// Returns the path to the pending-entry slot.
    #[must_use]
    pub fn pending_path(&self) -> PathBuf {
        PathBuf::from(PENDING_FILE)
    }

    /// Returns the path to the select cache.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        PathBuf::from(CACHE_FILE)
    }

    /// Returns the directory holding all table directories.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(DATA_DIR)
    }

    /// Returns the record directory of a table.
    #[must_use]
    pub fn table_dir(&self, table: &str) -> PathBuf {
        self.data_dir().join(table)
    }

    /// Returns the file of one record.
    #[must_use]
    pub fn record_path(&self, table: &str, id: &str) -> PathBuf {
        self.table_dir(table)
            .join(format!("{id}.{RECORD_EXTENSION}"))
    }

    /// Extracts the record id from a file name in a table directory.
    ///
    /// Returns `None` for anything that is not a record file.
    #[must_use]
    pub fn record_id_from_file_name(file_name: &str) -> Option<&str> {
        let id = file_name.strip_suffix(RECORD_EXTENSION)?.strip_suffix('.')?;
        validate_name(id).ok().map(|()| id)
    }

    /// Returns true if the schema file exists.
    pub fn is_initialized(&self) -> CoreResult<bool> {
        Ok(self.backend.exists(&self.schema_path())?)
    }

    /// Creates the empty files and the data directory of a new database.
    pub fn initialize(&self) -> CoreResult<()> {
        self.backend.write(&self.schema_path(), b"")?;
        self.backend.write(&self.pending_path(), b"")?;
        self.backend.write(&self.cache_path(), b"")?;
        self.backend.create_dir_all(&self.data_dir())?;
        Ok(())
    }

    /// Reads a whole file as UTF-8. Missing files are `None`.
    pub fn read_text(&self, path: &Path) -> CoreResult<Option<String>> {
        match self.backend.read(path)? {
            Some(bytes) => String::from_utf8(bytes).map(Some).map_err(|_| {
                CoreError::invalid_format(format!("{} is not valid UTF-8", path.display()))
            }),
            None => Ok(None),
        }
    }

    /// Replaces a file with text.
    pub fn write_text(&self, path: &Path, text: &str) -> CoreResult<()> {
        self.backend.write(path, text.as_bytes())?;
        Ok(())
    }

    /// Reads and decodes a JSON file.
    ///
    /// Missing and empty files are `None`.
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> CoreResult<Option<T>> {
        let Some(bytes) = self.backend.read(path)? else {
            return Ok(None);
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CoreError::invalid_format(format!("{}: {e}", path.display())))
    }

    /// Encodes a value as indented JSON and replaces the file with it.
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> CoreResult<()> {
        let data = serde_json::to_vec_pretty(value)?;
        self.backend.write(path, &data)?;
        Ok(())
    }
}

impl std::fmt::Debug for DatabaseDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseDir")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
