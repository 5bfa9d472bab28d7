//! Record CRUD over the database directory.
//!
//! Every mutation follows the same order:
//!
//! 1. Validate against the schema (required values, declared types,
//!    `<table>_id` references). Nothing is written if this fails.
//! 2. Write the intent to the recovery log.
//! 3. Apply the mutation to the record file.
//!
//! A crash between 2 and 3 leaves an entry that `replay` can finish.

use super::{IdGenerator, Record, RecordId};
use crate::cache::{QueryCache, SelectQuery};
use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult, ObjectKind, ValidationError};
use crate::recovery::{Action, PendingEntry, RecoveryLog};
use crate::schema::{referenced_table, FieldDef, Schema, SchemaStore, TableSchema, ID_FIELD};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Field values supplied by a caller, or the equality filters of a select.
pub type FieldMap = BTreeMap<String, String>;

/// Reads and writes the records of one database.
#[derive(Clone)]
pub struct RecordStore {
    dir: DatabaseDir,
    schema: SchemaStore,
    log: RecoveryLog,
    cache: QueryCache,
    ids: Arc<dyn IdGenerator>,
    strict_types: bool,
}

impl RecordStore {
    /// Creates a record store.
    pub fn new(
        dir: DatabaseDir,
        log: RecoveryLog,
        cache: QueryCache,
        ids: Arc<dyn IdGenerator>,
        strict_types: bool,
    ) -> Self {
        Self {
            schema: SchemaStore::new(dir.clone()),
            dir,
            log,
            cache,
            ids,
            strict_types,
        }
    }

    /// Inserts a record under a freshly generated id.
    ///
    /// Every schema field except `id` takes the caller's value. Keys that are
    /// not schema fields are ignored.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the table is not declared.
    /// - `Validation(MissingValue)` for a missing or blank value of a field
    ///   that is not a `<table>_id` reference.
    /// - `Validation(TypeMismatch)` for a value that does not parse as its
    ///   declared type.
    /// - `ReferentialIntegrity` for a non-empty `<table>_id` value that does
    ///   not name an existing record.
    pub fn insert(&self, table: &str, fields: &FieldMap) -> CoreResult<RecordId> {
        let id = self.ids.generate();
        self.insert_with_id(table, id, fields)
    }

    /// Inserts several records into one table, in order.
    ///
    /// Each row is a separate [`insert`](Self::insert) with its own id and
    /// its own intent, so afterwards the pending slot holds the last row.
    /// The batch stops at the first failing row; rows before it stay
    /// committed.
    ///
    /// # Errors
    ///
    /// The error of the first row that fails, as for `insert`.
    pub fn insert_many<'a, I>(&self, table: &str, rows: I) -> CoreResult<Vec<RecordId>>
    where
        I: IntoIterator<Item = &'a FieldMap>,
    {
        rows.into_iter()
            .map(|fields| self.insert(table, fields))
            .collect()
    }

    /// Inserts a record under a known id. Used by replay.
    pub(crate) fn insert_with_id(
        &self,
        table: &str,
        id: RecordId,
        fields: &FieldMap,
    ) -> CoreResult<RecordId> {
        let schema = self.schema.load()?;
        let table_schema = schema.require_table(table)?;

        let mut record = Record::new();
        record.set(ID_FIELD, id.as_str());
        for field in table_schema.fields.iter().filter(|f| !f.is_id()) {
            let value = fields.get(&field.name).map(String::as_str).unwrap_or_default();
            if value.trim().is_empty() {
                if field.referenced_table().is_none() {
                    return Err(ValidationError::MissingValue {
                        field: field.name.clone(),
                    }
                    .into());
                }
                record.set(field.name.as_str(), "");
                continue;
            }
            self.check_type(field, value)?;
            record.set(field.name.as_str(), value);
        }
        log_ignored_keys(table_schema, fields);
        self.check_references(&schema, &record)?;

        self.log
            .write_intent(&PendingEntry::new(Action::Insert, self.dir.name(), table, record.clone()))?;
        self.dir
            .write_json(&self.dir.record_path(table, id.as_str()), &record)?;
        self.cache.on_write(table)?;

        info!(db = self.dir.name(), table, id = %id, "inserted record");
        Ok(id)
    }

    /// Merges non-empty values for schema fields over a stored record.
    ///
    /// Returns the record as written.
    ///
    /// # Errors
    ///
    /// `NotFound` if the table or record does not exist. Type and reference
    /// checks apply to the supplied values as for [`insert`](Self::insert).
    pub fn update(&self, table: &str, id: &str, fields: &FieldMap) -> CoreResult<Record> {
        let schema = self.schema.load()?;
        let table_schema = schema.require_table(table)?;
        let mut record = self
            .get(table, id)?
            .ok_or_else(|| record_not_found(table, id))?;

        let mut changes = Record::new();
        for field in table_schema.fields.iter().filter(|f| !f.is_id()) {
            let Some(value) = fields.get(&field.name).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            self.check_type(field, value)?;
            changes.set(field.name.as_str(), value.as_str());
        }
        log_ignored_keys(table_schema, fields);
        self.check_references(&schema, &changes)?;

        for (field, value) in changes.iter() {
            record.set(field, value);
        }
        self.log
            .write_intent(&PendingEntry::new(Action::Update, self.dir.name(), table, record.clone()))?;
        self.dir.write_json(&self.dir.record_path(table, id), &record)?;
        self.cache.on_write(table)?;

        info!(db = self.dir.name(), table, id, changed = changes.len(), "updated record");
        Ok(record)
    }

    /// Removes a record.
    ///
    /// # Errors
    ///
    /// `NotFound` if the table or record does not exist; the recovery log is
    /// left untouched in that case.
    pub fn delete(&self, table: &str, id: &str) -> CoreResult<()> {
        self.schema.load()?.require_table(table)?;
        if !self.exists(table, id)? {
            return Err(record_not_found(table, id));
        }
        let record_id = RecordId::new(id)?;

        self.log
            .write_intent(&PendingEntry::delete(self.dir.name(), table, &record_id))?;
        self.dir
            .backend()
            .remove_file(&self.dir.record_path(table, id))?;
        self.cache.on_write(table)?;

        info!(db = self.dir.name(), table, id, "deleted record");
        Ok(())
    }

    /// Returns the records of a table matching every filter, in file-name
    /// order.
    ///
    /// Results come from the query cache when an identical select was cached
    /// before; otherwise the table is scanned and the result cached.
    ///
    /// # Errors
    ///
    /// `NotFound` if the table is not declared, `InvalidFormat` for an
    /// unreadable record file.
    pub fn select(&self, table: &str, filters: &FieldMap) -> CoreResult<Vec<Record>> {
        self.schema.load()?.require_table(table)?;

        let query = SelectQuery::new(self.dir.name(), table, filters.clone());
        if let Some(cached) = self.cache.lookup(&query)? {
            debug!(table, rows = cached.len(), "select served from cache");
            return Ok(cached);
        }

        let records = self
            .scan(table)?
            .into_iter()
            .filter(|record| record.matches(filters))
            .collect::<Vec<_>>();
        self.cache.save(&query, &records)?;
        debug!(table, rows = records.len(), "select scanned table");
        Ok(records)
    }

    /// Reads every record file of a table, bypassing the cache.
    pub fn scan(&self, table: &str) -> CoreResult<Vec<Record>> {
        let table_dir = self.dir.table_dir(table);
        let backend = self.dir.backend();
        if !backend.is_dir(&table_dir)? {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for name in backend.list(&table_dir)? {
            if DatabaseDir::record_id_from_file_name(&name).is_none() {
                continue;
            }
            if let Some(record) = self.dir.read_json::<Record>(&table_dir.join(&name))? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Reads one record. Ids that cannot name a file are simply absent.
    pub fn get(&self, table: &str, id: &str) -> CoreResult<Option<Record>> {
        if RecordId::new(id).is_err() {
            return Ok(None);
        }
        self.dir.read_json(&self.dir.record_path(table, id))
    }

    /// Returns true if the record file exists.
    pub fn exists(&self, table: &str, id: &str) -> CoreResult<bool> {
        if RecordId::new(id).is_err() {
            return Ok(false);
        }
        Ok(self.dir.backend().exists(&self.dir.record_path(table, id))?)
    }

    fn check_type(&self, field: &FieldDef, value: &str) -> CoreResult<()> {
        if self.strict_types && field.field_type.parse_value(value).is_none() {
            return Err(ValidationError::TypeMismatch {
                field: field.name.clone(),
                expected: field.field_type,
                value: value.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Checks that every non-empty `<table>_id` value of `record` names an
    /// existing record of an existing table.
    pub fn check_references(&self, schema: &Schema, record: &Record) -> CoreResult<()> {
        for (field, value) in record.iter() {
            let Some(target) = referenced_table(field) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            let table_missing = !schema.has_table(target);
            if table_missing || !self.exists(target, value)? {
                return Err(CoreError::ReferentialIntegrity {
                    field: field.to_string(),
                    table: target.to_string(),
                    value: value.to_string(),
                    table_missing,
                });
            }
        }
        Ok(())
    }
}

fn record_not_found(table: &str, id: &str) -> CoreError {
    CoreError::not_found(ObjectKind::Record, format!("{table}/{id}"))
}

fn log_ignored_keys(table: &TableSchema, fields: &FieldMap) {
    for key in fields.keys().filter(|k| !table.has_field(k)) {
        debug!(table = %table.name, field = %key, "ignoring value for undeclared field");
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("dir", &self.dir)
            .field("strict_types", &self.strict_types)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheMode;
    use crate::record::UuidGenerator;
    use recdb_storage::{InMemoryBackend, StorageBackend};
    use std::path::Path;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Counter(AtomicU64);

    impl IdGenerator for Counter {
        fn generate(&self) -> RecordId {
            let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
            RecordId::new(format!("r{n}")).unwrap()
        }
    }

    struct Fixture {
        dir: DatabaseDir,
        store: RecordStore,
    }

    fn fixture_with(mode: CacheMode, ids: Arc<dyn IdGenerator>) -> Fixture {
        let dir = DatabaseDir::new("shop", Arc::new(InMemoryBackend::new()));
        dir.initialize().unwrap();
        SchemaStore::new(dir.clone())
            .save(
                &Schema::parse(
                    "[users]\nid:string:pk,unique\nname:string\nage:int\n\n\
                     [posts]\nid:string:pk,unique\ntitle:string\nusers_id:string:fk=users.id\n",
                )
                .unwrap(),
            )
            .unwrap();
        let store = RecordStore::new(
            dir.clone(),
            RecoveryLog::new(dir.clone()),
            QueryCache::new(dir.clone(), mode),
            ids,
            true,
        );
        Fixture { dir, store }
    }

    fn fixture() -> Fixture {
        fixture_with(CacheMode::AppendOnly, Arc::new(Counter(AtomicU64::new(0))))
    }

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn pending(dir: &DatabaseDir) -> Option<PendingEntry> {
        RecoveryLog::new(dir.clone()).read().unwrap()
    }

    #[test]
    fn insert_writes_record_and_intent() {
        let f = fixture();
        let id = f.store.insert("users", &fields(&[("name", "ada"), ("age", "36")])).unwrap();
        assert_eq!(id, "r1");

        let record = f.store.get("users", "r1").unwrap().unwrap();
        assert_eq!(record.get("name"), Some("ada"));
        assert_eq!(record.id(), Some("r1"));
        assert!(f
            .dir
            .backend()
            .exists(Path::new("data/users/r1.json"))
            .unwrap());

        let entry = pending(&f.dir).unwrap();
        assert_eq!(entry.action, Action::Insert);
        assert_eq!(entry.data, record);
    }

    #[test]
    fn insert_many_gives_each_row_an_id() {
        let f = fixture();
        let rows = [
            fields(&[("name", "ada"), ("age", "36")]),
            fields(&[("name", "bob"), ("age", "40")]),
            fields(&[("name", "cy"), ("age", "7")]),
        ];

        let ids = f.store.insert_many("users", &rows).unwrap();

        assert_eq!(ids, vec!["r1", "r2", "r3"]);
        assert_eq!(f.store.select("users", &FieldMap::new()).unwrap().len(), 3);
        let entry = pending(&f.dir).unwrap();
        assert_eq!(entry.action, Action::Insert);
        assert_eq!(entry.record_id(), "r3");
        assert_eq!(entry.data.get("name"), Some("cy"));
    }

    #[test]
    fn insert_many_stops_at_first_bad_row() {
        let f = fixture();
        let rows = [
            fields(&[("name", "ada"), ("age", "36")]),
            fields(&[("name", "bob")]),
            fields(&[("name", "cy"), ("age", "7")]),
        ];

        let err = f.store.insert_many("users", &rows).unwrap_err();

        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::MissingValue { .. })
        ));
        assert!(f.store.get("users", "r1").unwrap().is_some());
        assert!(f.store.get("users", "r3").unwrap().is_none());
        assert_eq!(pending(&f.dir).unwrap().record_id(), "r1");
    }

    #[test]
    fn insert_requires_non_reference_fields() {
        let f = fixture();
        let err = f.store.insert("users", &fields(&[("name", "ada")])).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::MissingValue { ref field }) if field == "age"
        ));
        assert!(pending(&f.dir).is_none());
    }

    #[test]
    fn insert_checks_types() {
        let f = fixture();
        let err = f
            .store
            .insert("users", &fields(&[("name", "ada"), ("age", "old")]))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn lenient_types_accept_anything() {
        let dir = DatabaseDir::new("shop", Arc::new(InMemoryBackend::new()));
        dir.initialize().unwrap();
        SchemaStore::new(dir.clone())
            .save(&Schema::parse("[t]\nid:string:pk,unique\nn:int\n").unwrap())
            .unwrap();
        let store = RecordStore::new(
            dir.clone(),
            RecoveryLog::new(dir.clone()),
            QueryCache::new(dir, CacheMode::AppendOnly),
            Arc::new(UuidGenerator),
            false,
        );
        assert!(store.insert("t", &fields(&[("n", "many")])).is_ok());
    }

    #[test]
    fn dangling_reference_writes_nothing() {
        let f = fixture();
        let err = f
            .store
            .insert("posts", &fields(&[("title", "hi"), ("users_id", "nobody")]))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::ReferentialIntegrity { table_missing: false, .. }
        ));
        assert!(f.store.scan("posts").unwrap().is_empty());
        assert!(pending(&f.dir).is_none());
    }

    #[test]
    fn valid_and_blank_references() {
        let f = fixture();
        let user = f.store.insert("users", &fields(&[("name", "ada"), ("age", "36")])).unwrap();

        let post = f
            .store
            .insert("posts", &fields(&[("title", "hi"), ("users_id", user.as_str())]))
            .unwrap();
        let orphan = f.store.insert("posts", &fields(&[("title", "solo")])).unwrap();

        assert_eq!(
            f.store.get("posts", post.as_str()).unwrap().unwrap().get("users_id"),
            Some(user.as_str())
        );
        assert_eq!(
            f.store.get("posts", orphan.as_str()).unwrap().unwrap().get("users_id"),
            Some("")
        );
    }

    #[test]
    fn update_merges_non_empty_values() {
        let f = fixture();
        let id = f.store.insert("users", &fields(&[("name", "ada"), ("age", "36")])).unwrap();

        let updated = f
            .store
            .update("users", id.as_str(), &fields(&[("name", ""), ("age", "37"), ("id", "x")]))
            .unwrap();

        assert_eq!(updated.get("name"), Some("ada"));
        assert_eq!(updated.get("age"), Some("37"));
        assert_eq!(updated.id(), Some(id.as_str()));
        assert_eq!(f.store.get("users", id.as_str()).unwrap().unwrap(), updated);
        assert_eq!(pending(&f.dir).unwrap().action, Action::Update);
    }

    #[test]
    fn update_missing_record_is_not_found() {
        let f = fixture();
        let err = f.store.update("users", "ghost", &fields(&[("age", "1")])).unwrap_err();
        assert!(err.is_not_found(ObjectKind::Record));
    }

    #[test]
    fn delete_removes_file() {
        let f = fixture();
        let id = f.store.insert("users", &fields(&[("name", "ada"), ("age", "36")])).unwrap();

        f.store.delete("users", id.as_str()).unwrap();

        assert!(!f.store.exists("users", id.as_str()).unwrap());
        let entry = pending(&f.dir).unwrap();
        assert_eq!(entry.action, Action::Delete);
        assert_eq!(entry.record_id(), id.as_str());
    }

    #[test]
    fn delete_missing_leaves_slot_untouched() {
        let f = fixture();
        f.store.insert("users", &fields(&[("name", "ada"), ("age", "36")])).unwrap();
        let before = pending(&f.dir);

        let err = f.store.delete("users", "ghost").unwrap_err();

        assert!(err.is_not_found(ObjectKind::Record));
        assert_eq!(pending(&f.dir), before);
    }

    #[test]
    fn select_filters_and_caches() {
        let f = fixture();
        f.store.insert("users", &fields(&[("name", "ada"), ("age", "36")])).unwrap();
        f.store.insert("users", &fields(&[("name", "bob"), ("age", "36")])).unwrap();

        let all = f.store.select("users", &FieldMap::new()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id(), Some("r1"));

        let ada = f.store.select("users", &fields(&[("name", "ada")])).unwrap();
        assert_eq!(ada.len(), 1);

        // Append-only cache: the earlier result is served after a change.
        f.store.insert("users", &fields(&[("name", "cy"), ("age", "1")])).unwrap();
        assert_eq!(f.store.select("users", &FieldMap::new()).unwrap().len(), 2);
    }

    #[test]
    fn invalidating_cache_sees_writes() {
        let f = fixture_with(
            CacheMode::InvalidateOnWrite,
            Arc::new(Counter(AtomicU64::new(0))),
        );
        f.store.insert("users", &fields(&[("name", "ada"), ("age", "36")])).unwrap();
        assert_eq!(f.store.select("users", &FieldMap::new()).unwrap().len(), 1);

        f.store.insert("users", &fields(&[("name", "bob"), ("age", "2")])).unwrap();
        assert_eq!(f.store.select("users", &FieldMap::new()).unwrap().len(), 2);
    }

    #[test]
    fn select_unknown_table_is_not_found() {
        let f = fixture();
        let err = f.store.select("ghost", &FieldMap::new()).unwrap_err();
        assert!(err.is_not_found(ObjectKind::Table));
    }

    #[test]
    fn scan_skips_non_record_files() {
        let f = fixture();
        f.store.insert("users", &fields(&[("name", "ada"), ("age", "36")])).unwrap();
        f.dir
            .backend()
            .write(Path::new("data/users/notes.txt"), b"hello")
            .unwrap();
        assert_eq!(f.store.scan("users").unwrap().len(), 1);
    }
}
