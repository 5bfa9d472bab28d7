//! Persistence of the schema file.

use super::{validate_field_definition, FieldDef, Schema, TableSchema};
use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult, ObjectKind};
use tracing::{debug, info};

/// Reads and rewrites `schema.txt` of one database.
///
/// Every mutation loads the current file, applies the change to the typed
/// [`Schema`] and writes the result back with a single replace. A mutation
/// that fails leaves the file untouched.
#[derive(Debug, Clone)]
pub struct SchemaStore {
    dir: DatabaseDir,
}

impl SchemaStore {
    /// Creates a store for the database directory.
    pub fn new(dir: DatabaseDir) -> Self {
        Self { dir }
    }

    /// Loads the current schema.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the database has no schema file and
    /// `InvalidFormat` if the file cannot be parsed.
    pub fn load(&self) -> CoreResult<Schema> {
        let text = self
            .dir
            .read_text(&self.dir.schema_path())?
            .ok_or_else(|| CoreError::not_found(ObjectKind::Database, self.dir.name()))?;
        Schema::parse(&text)
    }

    /// Replaces the schema file.
    pub fn save(&self, schema: &Schema) -> CoreResult<()> {
        self.dir
            .write_text(&self.dir.schema_path(), &schema.to_text())
    }

    /// Loads the schema, applies `f` and saves the result if `f` succeeds.
    pub fn modify<R>(&self, f: impl FnOnce(&mut Schema) -> CoreResult<R>) -> CoreResult<R> {
        let mut schema = self.load()?;
        let result = f(&mut schema)?;
        self.save(&schema)?;
        Ok(result)
    }

    /// Returns the schema of one table.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the table is not declared.
    pub fn table(&self, name: &str) -> CoreResult<TableSchema> {
        self.load()?.require_table(name).cloned()
    }

    /// Adds a field to a table.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a bad definition, `NotFound` for a missing
    /// table and `AlreadyExists` for a duplicate field name.
    pub fn add_field(&self, table: &str, definition: &str) -> CoreResult<FieldDef> {
        let field = validate_field_definition(definition)?;
        self.modify(|schema| {
            schema.require_table_mut(table)?.add_field(field.clone())?;
            Ok(())
        })?;
        info!(db = self.dir.name(), table, field = %field, "added field");
        Ok(field)
    }

    /// Removes a field from a table.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a missing table or field and
    /// `Validation(ProtectedField)` for `id`.
    pub fn remove_field(&self, table: &str, field: &str) -> CoreResult<FieldDef> {
        let removed = self.modify(|schema| schema.require_table_mut(table)?.remove_field(field))?;
        info!(db = self.dir.name(), table, field, "removed field");
        Ok(removed)
    }

    /// Replaces a field definition with one of the same name.
    ///
    /// The field moves to the end of its section.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a bad definition or an attempt to redefine
    /// `id`, and `NotFound` for a missing table or field.
    pub fn update_field(&self, table: &str, definition: &str) -> CoreResult<FieldDef> {
        let field = validate_field_definition(definition)?;
        self.modify(|schema| schema.require_table_mut(table)?.update_field(field.clone()))?;
        debug!(db = self.dir.name(), table, field = %field, "updated field");
        Ok(field)
    }
}
