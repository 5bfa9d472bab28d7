//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases
//! and common test scenarios.

use recdb_core::{Config, Database, FieldMap, IdGenerator, RecordId};
use recdb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Name given to every fixture database.
pub const TEST_DB_NAME: &str = "testdb";

/// Ids `rec0001`, `rec0002`, ... in insertion order.
///
/// Zero padding keeps file-name order equal to insertion order.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    /// Creates a generator with the `rec` prefix.
    pub fn new() -> Self {
        Self::with_prefix("rec")
    }

    /// Creates a generator with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }

    /// Returns the id the `n`th generated id will have (1-based).
    pub fn nth(&self, n: u64) -> String {
        format!("{}{n:04}", self.prefix)
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIds {
    fn generate(&self) -> RecordId {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        RecordId::new(self.nth(n)).expect("prefix must be a valid record name")
    }
}

/// A test database with automatic cleanup.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    /// The backend the database writes through.
    pub backend: Arc<dyn StorageBackend>,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestDatabase {
    /// Creates a new in-memory test database with sequential ids.
    pub fn memory() -> Self {
        Self::memory_with_config(Config::default())
    }

    /// Creates a new in-memory test database with a custom configuration.
    pub fn memory_with_config(config: Config) -> Self {
        let backend: Arc<dyn StorageBackend> = Arc::new(InMemoryBackend::new());
        Self::create(backend, config, None)
    }

    /// Creates a new file-based test database with sequential ids.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let backend = FileBackend::open_with_create_dirs(&temp_dir.path().join(TEST_DB_NAME))
            .expect("Failed to create file backend")
            .sync_writes(false);
        Self::create(Arc::new(backend), Config::default(), Some(temp_dir))
    }

    /// Creates a test database on a caller-supplied backend.
    pub fn on_backend(backend: Arc<dyn StorageBackend>) -> Self {
        Self::create(backend, Config::default(), None)
    }

    fn create(backend: Arc<dyn StorageBackend>, config: Config, temp_dir: Option<TempDir>) -> Self {
        let db = Database::create_with_backend(TEST_DB_NAME, Arc::clone(&backend), config)
            .expect("Failed to create test database")
            .with_id_generator(Arc::new(SequentialIds::new()));
        Self {
            db,
            backend,
            temp_dir,
        }
    }

    /// Opens a second handle on the same storage, as a restarted process
    /// would. The new handle has its own sequential ids starting at `rec0001`.
    pub fn reopen(&self) -> Database {
        Database::open_with_backend(TEST_DB_NAME, Arc::clone(&self.backend), self.db.config().clone())
            .expect("Failed to reopen test database")
            .with_id_generator(Arc::new(SequentialIds::with_prefix("reopened")))
    }

    /// Returns the database directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<std::path::PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().join(TEST_DB_NAME))
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Builds a field map from string pairs.
pub fn fields(pairs: &[(&str, &str)]) -> FieldMap {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Runs a test with a temporary in-memory database.
///
/// # Example
///
/// ```rust,ignore
/// use recdb_testkit::with_temp_db;
///
/// #[test]
/// fn my_test() {
///     with_temp_db(|db| {
///         db.add_table("users").unwrap();
///     });
/// }
/// ```
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db.db)
}

/// Runs a test with a temporary file-based database.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database, &Path) -> R,
{
    let test_db = TestDatabase::file();
    let path = test_db.path().expect("File database should have a path");
    f(&test_db.db, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use recdb_core::Relation;

    /// A database with `users(name:string, age:int)` and
    /// `posts(title:string)` linked one-to-many from users to posts.
    pub fn users_and_posts() -> TestDatabase {
        let db = TestDatabase::memory();
        db.add_table("users").expect("add users");
        db.add_field("users", "name:string").expect("add name");
        db.add_field("users", "age:int").expect("add age");
        db.add_table("posts").expect("add posts");
        db.add_field("posts", "title:string").expect("add title");
        db.link_tables("users", "posts", Relation::OneToMany)
            .expect("link users to posts");
        db
    }

    /// [`users_and_posts`] with `count` users named `user<i>`, aged `i`.
    pub fn populated(count: usize) -> TestDatabase {
        let db = users_and_posts();
        for i in 0..count {
            let name = format!("user{i}");
            let age = i.to_string();
            db.insert("users", &fields(&[("name", &name), ("age", &age)]))
                .expect("insert user");
        }
        db
    }
}
