//! # RecDB Storage
//!
//! Storage backend trait and implementations for RecDB.
//!
//! Backends are **path-keyed file stores** rooted at a directory. They know
//! nothing about schemas, records or logs; every path they receive is
//! relative to their root.
//!
//! ## Design Principles
//!
//! - Writes replace whole files (no appends, no partial updates)
//! - Paths are relative; absolute paths and `..` are rejected
//! - Must be `Send + Sync` so handles can be shared
//! - RecDB owns all file format interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral databases
//! - [`FileBackend`] - For persistent storage using OS file APIs
//! - [`ScopedBackend`] - A subdirectory view over another backend
//!
//! ## Example
//!
//! ```rust
//! use recdb_storage::{StorageBackend, InMemoryBackend};
//! use std::path::Path;
//!
//! let backend = InMemoryBackend::new();
//! backend.write(Path::new("data/users/a.json"), b"{}").unwrap();
//! assert!(backend.is_dir(Path::new("data/users")).unwrap());
//! assert_eq!(backend.list(Path::new("data/users")).unwrap(), vec!["a.json"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod scoped;

pub use backend::{normalize, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use scoped::ScopedBackend;
