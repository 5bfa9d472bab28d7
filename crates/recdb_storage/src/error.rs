//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file or directory does not exist.
    #[error("not found: {}", path.display())]
    NotFound {
        /// The missing path, relative to the backend root.
        path: PathBuf,
    },

    /// The destination of a create or rename already exists.
    #[error("already exists: {}", path.display())]
    AlreadyExists {
        /// The conflicting path, relative to the backend root.
        path: PathBuf,
    },

    /// The path escapes the backend root or is otherwise unusable.
    #[error("invalid path: {}", path.display())]
    InvalidPath {
        /// The rejected path.
        path: PathBuf,
    },
}

impl StorageError {
    /// Creates a not found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates an already exists error.
    pub fn already_exists(path: impl Into<PathBuf>) -> Self {
        Self::AlreadyExists { path: path.into() }
    }

    /// Returns true if this error reports a missing path.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
