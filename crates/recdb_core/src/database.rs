//! Database handle.

use crate::cache::QueryCache;
use crate::config::Config;
use crate::dir::{validate_name, DatabaseDir};
use crate::error::{CoreError, CoreResult, ObjectKind};
use crate::record::{FieldMap, IdGenerator, Record, RecordId, RecordStore, UuidGenerator};
use crate::recovery::{self, PendingEntry, RecoveryLog, ReplayOutcome};
use crate::schema::{FieldDef, Schema, SchemaStore};
use crate::table::{Link, Relation, TableManager};
use recdb_storage::{InMemoryBackend, StorageBackend};
use std::sync::Arc;
use tracing::{info, warn};

/// One open database.
///
/// `Database` ties the schema store, record store, recovery log, query cache
/// and table manager of a single database directory together. All of them
/// share one storage backend rooted at that directory.
///
/// # Example
///
/// ```rust,ignore
/// use recdb_core::{Database, Config};
/// use std::collections::BTreeMap;
///
/// let db = Database::open_in_memory("shop")?;
/// db.add_table("users")?;
/// db.add_field("users", "name:string")?;
///
/// let mut fields = BTreeMap::new();
/// fields.insert("name".to_string(), "ada".to_string());
/// let id = db.insert("users", &fields)?;
///
/// let rows = db.select("users", &BTreeMap::new())?;
/// assert_eq!(rows[0].id(), Some(id.as_str()));
/// ```
pub struct Database {
    config: Config,
    dir: DatabaseDir,
    schema: SchemaStore,
    log: RecoveryLog,
    cache: QueryCache,
    records: RecordStore,
    tables: TableManager,
}

impl Database {
    /// Opens an existing database whose directory is the root of `backend`.
    ///
    /// A non-empty recovery slot is reported but not replayed; call
    /// [`replay`](Self::replay) to finish the interrupted mutation.
    ///
    /// # Errors
    ///
    /// `NotFound` if the backend holds no `schema.txt`.
    pub fn open_with_backend(
        name: &str,
        backend: Arc<dyn StorageBackend>,
        config: Config,
    ) -> CoreResult<Self> {
        validate_name(name)?;
        let dir = DatabaseDir::new(name, backend);
        if !dir.is_initialized()? {
            return Err(CoreError::not_found(ObjectKind::Database, name));
        }
        let db = Self::assemble(dir, config);
        if db.log.is_pending()? {
            warn!(db = name, "database has an unreplayed pending entry");
        }
        info!(db = name, "opened database");
        Ok(db)
    }

    /// Creates an empty database at the root of `backend`.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the backend already holds a database.
    pub fn create_with_backend(
        name: &str,
        backend: Arc<dyn StorageBackend>,
        config: Config,
    ) -> CoreResult<Self> {
        validate_name(name)?;
        let dir = DatabaseDir::new(name, backend);
        if dir.is_initialized()? {
            return Err(CoreError::already_exists(ObjectKind::Database, name));
        }
        dir.initialize()?;
        info!(db = name, "created database");
        Ok(Self::assemble(dir, config))
    }

    /// Creates a non-persistent database for tests and scratch work.
    pub fn open_in_memory(name: &str) -> CoreResult<Self> {
        Self::create_with_backend(name, Arc::new(InMemoryBackend::new()), Config::default())
    }

    fn assemble(dir: DatabaseDir, config: Config) -> Self {
        Self::assemble_with_ids(dir, config, Arc::new(UuidGenerator))
    }

    fn assemble_with_ids(dir: DatabaseDir, config: Config, ids: Arc<dyn IdGenerator>) -> Self {
        let log = RecoveryLog::new(dir.clone());
        let cache = QueryCache::new(dir.clone(), config.cache_mode);
        let records = RecordStore::new(
            dir.clone(),
            log.clone(),
            cache.clone(),
            ids,
            config.strict_types,
        );
        Self {
            schema: SchemaStore::new(dir.clone()),
            tables: TableManager::new(dir.clone(), cache.clone()),
            config,
            dir,
            log,
            cache,
            records,
        }
    }

    /// Replaces the id generator used by [`insert`](Self::insert).
    #[must_use]
    pub fn with_id_generator(self, ids: Arc<dyn IdGenerator>) -> Self {
        Self::assemble_with_ids(self.dir, self.config, ids)
    }

    /// Returns the database name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.dir.name()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the storage backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        self.dir.backend()
    }

    // Schema

    /// Returns the parsed schema.
    pub fn get_schema(&self) -> CoreResult<Schema> {
        self.schema.load()
    }

    /// See [`SchemaStore::add_field`].
    pub fn add_field(&self, table: &str, definition: &str) -> CoreResult<FieldDef> {
        self.schema.add_field(table, definition)
    }

    /// See [`SchemaStore::remove_field`].
    pub fn remove_field(&self, table: &str, field: &str) -> CoreResult<FieldDef> {
        self.schema.remove_field(table, field)
    }

    /// See [`SchemaStore::update_field`].
    pub fn update_field(&self, table: &str, definition: &str) -> CoreResult<FieldDef> {
        self.schema.update_field(table, definition)
    }

    // Tables

    /// See [`TableManager::add_table`].
    pub fn add_table(&self, name: &str) -> CoreResult<()> {
        self.tables.add_table(name)
    }

    /// See [`TableManager::remove_table`].
    pub fn remove_table(&self, name: &str) -> CoreResult<()> {
        self.tables.remove_table(name)
    }

    /// See [`TableManager::rename_table`].
    pub fn rename_table(&self, old: &str, new: &str) -> CoreResult<()> {
        self.tables.rename_table(old, new)
    }

    /// See [`TableManager::list_tables`].
    pub fn list_tables(&self) -> CoreResult<Vec<String>> {
        self.tables.list_tables()
    }

    /// See [`TableManager::link_tables`].
    pub fn link_tables(&self, a: &str, b: &str, relation: Relation) -> CoreResult<Link> {
        self.tables.link_tables(a, b, relation)
    }

    /// See [`TableManager::unlink_tables`].
    pub fn unlink_tables(&self, a: &str, b: &str) -> CoreResult<Link> {
        self.tables.unlink_tables(a, b)
    }

    // Records

    /// See [`RecordStore::insert`].
    pub fn insert(&self, table: &str, fields: &FieldMap) -> CoreResult<RecordId> {
        self.records.insert(table, fields)
    }

    /// See [`RecordStore::insert_many`].
    pub fn insert_many<'a, I>(&self, table: &str, rows: I) -> CoreResult<Vec<RecordId>>
    where
        I: IntoIterator<Item = &'a FieldMap>,
    {
        self.records.insert_many(table, rows)
    }

    /// See [`RecordStore::update`].
    pub fn update(&self, table: &str, id: &str, fields: &FieldMap) -> CoreResult<Record> {
        self.records.update(table, id, fields)
    }

    /// See [`RecordStore::delete`].
    pub fn delete(&self, table: &str, id: &str) -> CoreResult<()> {
        self.records.delete(table, id)
    }

    /// See [`RecordStore::select`].
    pub fn select(&self, table: &str, filters: &FieldMap) -> CoreResult<Vec<Record>> {
        self.records.select(table, filters)
    }

    /// See [`RecordStore::get`].
    pub fn get(&self, table: &str, id: &str) -> CoreResult<Option<Record>> {
        self.records.get(table, id)
    }

    // Recovery and cache

    /// Returns the entry in the recovery slot, if any.
    pub fn pending(&self) -> CoreResult<Option<PendingEntry>> {
        self.log.read()
    }

    /// Finishes the mutation recorded in the recovery slot. See
    /// [`recovery::replay`].
    pub fn replay(&self) -> CoreResult<ReplayOutcome> {
        recovery::replay(&self.log, &self.records)
    }

    /// Returns the recovery log.
    #[must_use]
    pub fn recovery_log(&self) -> &RecoveryLog {
        &self.log
    }

    /// Returns the select cache.
    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Empties the select cache.
    pub fn clear_cache(&self) -> CoreResult<()> {
        self.cache.clear()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
