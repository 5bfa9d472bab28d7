//! Error types for RecDB core.

use crate::schema::FieldType;
use std::fmt;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// The kind of object an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// A database directory.
    Database,
    /// A table section of the schema.
    Table,
    /// A field of a table.
    Field,
    /// A stored record.
    Record,
    /// A link between two tables.
    Relationship,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Database => "database",
            Self::Table => "table",
            Self::Field => "field",
            Self::Record => "record",
            Self::Relationship => "relationship",
        })
    }
}

/// Reasons a field definition or a record value is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The definition does not have the `name:type[:options]` shape.
    #[error("malformed field definition `{definition}` (expected name:type[:options])")]
    Malformed {
        /// The rejected definition.
        definition: String,
    },

    /// A name is empty.
    #[error("name must not be empty")]
    EmptyName,

    /// A name contains characters that cannot appear in the schema or on disk.
    #[error("invalid name `{name}`")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// The declared type is not one of the allowed types.
    #[error("invalid type `{field_type}` (allowed: int, string, float, bool, datetime)")]
    InvalidType {
        /// The rejected type.
        field_type: String,
    },

    /// An option is not `pk`, `unique` or `fk=...`.
    #[error("invalid option `{option}` (allowed: pk, unique, fk=<table>.<field>)")]
    InvalidOption {
        /// The rejected option.
        option: String,
    },

    /// The field is built in and cannot be removed or redefined.
    #[error("field `{field}` is protected")]
    ProtectedField {
        /// The protected field.
        field: String,
    },

    /// A required value is missing or blank.
    #[error("missing value for field `{field}`")]
    MissingValue {
        /// The field without a value.
        field: String,
    },

    /// A value does not parse as its declared type.
    #[error("value `{value}` for field `{field}` is not a valid {expected}")]
    TypeMismatch {
        /// The field being written.
        field: String,
        /// The declared type.
        expected: FieldType,
        /// The rejected value.
        value: String,
    },
}

/// Errors that can occur in RecDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] recdb_storage::StorageError),

    /// JSON encoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A database, table, field, record or relationship does not exist.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// What was looked up.
        kind: ObjectKind,
        /// Its name or id.
        name: String,
    },

    /// A database, table or field with this name already exists.
    #[error("{kind} already exists: {name}")]
    AlreadyExists {
        /// What was being created.
        kind: ObjectKind,
        /// The conflicting name.
        name: String,
    },

    /// A field definition or a value was rejected.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A `<table>_id` value does not name an existing record.
    #[error("{}", integrity_message(field, table, value, *table_missing))]
    ReferentialIntegrity {
        /// The foreign-key field.
        field: String,
        /// The referenced table.
        table: String,
        /// The dangling id.
        value: String,
        /// Whether the referenced table itself is missing.
        table_missing: bool,
    },

    /// The pending slot holds something that cannot be replayed.
    #[error("invalid pending log entry: {message}")]
    InvalidLogEntry {
        /// Description of the problem.
        message: String,
    },

    /// A file on disk could not be decoded.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },
}

fn integrity_message(field: &str, table: &str, value: &str, table_missing: bool) -> String {
    if table_missing {
        format!("field `{field}` references table `{table}` which does not exist")
    } else {
        format!("field `{field}` references `{value}` which does not exist in table `{table}`")
    }
}

impl CoreError {
    /// Creates a not found error.
    pub fn not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates an already exists error.
    pub fn already_exists(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    /// Creates an invalid log entry error.
    pub fn invalid_log_entry(message: impl Into<String>) -> Self {
        Self::InvalidLogEntry {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns true for failures of the underlying storage.
    ///
    /// These are the errors a caller must not drop during replay: the pending
    /// mutation may still be unapplied.
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is a not found error of the given kind.
    #[must_use]
    pub fn is_not_found(&self, expected: ObjectKind) -> bool {
        matches!(self, Self::NotFound { kind, .. } if *kind == expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message() {
        let err = CoreError::not_found(ObjectKind::Table, "users");
        assert_eq!(err.to_string(), "table not found: users");
        assert!(err.is_not_found(ObjectKind::Table));
        assert!(!err.is_not_found(ObjectKind::Record));
    }

    #[test]
    fn integrity_messages() {
        let missing_row = CoreError::ReferentialIntegrity {
            field: "users_id".into(),
            table: "users".into(),
            value: "abc".into(),
            table_missing: false,
        };
        assert!(missing_row.to_string().contains("`abc`"));

        let missing_table = CoreError::ReferentialIntegrity {
            field: "users_id".into(),
            table: "users".into(),
            value: "abc".into(),
            table_missing: true,
        };
        assert!(missing_table.to_string().contains("table `users`"));
    }

    #[test]
    fn storage_errors_are_io() {
        let err = CoreError::from(recdb_storage::StorageError::not_found("x"));
        assert!(err.is_io());
        assert!(!CoreError::invalid_log_entry("bad").is_io());
    }

    #[test]
    fn validation_converts() {
        let err: CoreError = ValidationError::EmptyName.into();
        assert!(matches!(err, CoreError::Validation(ValidationError::EmptyName)));
    }
}
