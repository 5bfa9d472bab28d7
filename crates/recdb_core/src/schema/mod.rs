//! Typed schema: tables and their field definitions.
//!
//! The on-disk `schema.txt` format is handled by the `text` submodule only;
//! everything else in the crate works on [`Schema`] values.
//!
//! In-memory mutations here enforce the schema invariants (unique table and
//! field names, a non-removable `id` in every table). Persisting them is the
//! job of [`SchemaStore`].

mod field;
mod store;
mod text;
mod value;

pub use field::{
    referenced_table, validate_field_definition, FieldDef, FieldOption, FieldType,
    FOREIGN_KEY_SUFFIX, ID_FIELD,
};
pub use store::SchemaStore;
pub use value::Value;

use crate::dir::validate_name;
use crate::error::{CoreError, CoreResult, ObjectKind, ValidationError};

/// The ordered field definitions of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldDef>,
}

impl TableSchema {
    /// Creates a table holding only the built-in `id` field.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: vec![FieldDef::id()],
        }
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns true if the table has a field with this name.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Returns the field names in declaration order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Appends a field.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if a field of that name is present.
    pub fn add_field(&mut self, field: FieldDef) -> CoreResult<()> {
        if self.has_field(&field.name) {
            return Err(CoreError::already_exists(
                ObjectKind::Field,
                format!("{}.{}", self.name, field.name),
            ));
        }
        self.fields.push(field);
        Ok(())
    }

    /// Removes a field and returns its definition.
    ///
    /// # Errors
    ///
    /// Returns `ProtectedField` for `id` and `NotFound` for a missing field.
    pub fn remove_field(&mut self, name: &str) -> CoreResult<FieldDef> {
        if name == ID_FIELD {
            return Err(ValidationError::ProtectedField {
                field: name.to_string(),
            }
            .into());
        }
        let index = self
            .fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| {
                CoreError::not_found(ObjectKind::Field, format!("{}.{name}", self.name))
            })?;
        Ok(self.fields.remove(index))
    }

    /// Replaces a field definition: the old one is removed and the new one
    /// appended, leaving every other field as it was.
    ///
    /// The `id` field only accepts its current definition, which is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the field does not exist and `ProtectedField`
    /// when redefining `id`.
    pub fn update_field(&mut self, field: FieldDef) -> CoreResult<()> {
        if field.is_id() {
            return match self.field(ID_FIELD) {
                Some(current) if *current == field => Ok(()),
                _ => Err(ValidationError::ProtectedField {
                    field: field.name,
                }
                .into()),
            };
        }
        self.remove_field(&field.name)?;
        self.fields.push(field);
        Ok(())
    }
}

/// The declared tables of a database, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    /// Tables in the order they appear in `schema.txt`.
    pub tables: Vec<TableSchema>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a table.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Looks up a table for modification.
    pub fn table_mut(&mut self, name: &str) -> Option<&mut TableSchema> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    /// Looks up a table, failing with `NotFound`.
    pub fn require_table(&self, name: &str) -> CoreResult<&TableSchema> {
        self.table(name)
            .ok_or_else(|| CoreError::not_found(ObjectKind::Table, name))
    }

    /// Looks up a table for modification, failing with `NotFound`.
    pub fn require_table_mut(&mut self, name: &str) -> CoreResult<&mut TableSchema> {
        self.table_mut(name)
            .ok_or_else(|| CoreError::not_found(ObjectKind::Table, name))
    }

    /// Returns true if the table exists.
    #[must_use]
    pub fn has_table(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    /// Returns the table names in file order.
    #[must_use]
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Appends a new table seeded with the `id` field.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad name and `AlreadyExists` for a
    /// duplicate.
    pub fn add_table(&mut self, name: &str) -> CoreResult<&mut TableSchema> {
        validate_name(name)?;
        if self.has_table(name) {
            return Err(CoreError::already_exists(ObjectKind::Table, name));
        }
        self.tables.push(TableSchema::new(name));
        let last = self.tables.len() - 1;
        Ok(&mut self.tables[last])
    }

    /// Removes a table.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the table does not exist.
    pub fn remove_table(&mut self, name: &str) -> CoreResult<TableSchema> {
        let index = self
            .tables
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| CoreError::not_found(ObjectKind::Table, name))?;
        Ok(self.tables.remove(index))
    }

    /// Renames a table in place, keeping its position.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for `old`, `AlreadyExists` for `new`, or a
    /// validation error for a bad new name.
    pub fn rename_table(&mut self, old: &str, new: &str) -> CoreResult<()> {
        validate_name(new)?;
        if !self.has_table(old) {
            return Err(CoreError::not_found(ObjectKind::Table, old));
        }
        if self.has_table(new) {
            return Err(CoreError::already_exists(ObjectKind::Table, new));
        }
        self.require_table_mut(old)?.name = new.to_string();
        Ok(())
    }
}
