//! Records and the record store.
//!
//! A record is a flat map of field name to string value, stored as one
//! pretty-printed JSON object per file. Values are kept as strings on disk;
//! [`Record::typed`] interprets them through the table schema.

mod id;
mod store;

pub use id::{IdGenerator, RecordId, UuidGenerator};
pub use store::{FieldMap, RecordStore};

use crate::error::{CoreError, CoreResult, ObjectKind, ValidationError};
use crate::schema::{TableSchema, Value, ID_FIELD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One stored record: field name to string value, including `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record id, if set.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.get(ID_FIELD)
    }

    /// Returns the raw value of a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Sets a field, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(field.into(), value.into())
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.0.remove(field)
    }

    /// Iterates over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// Consumes the record, returning the underlying map.
    #[must_use]
    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }

    /// Returns true if every filter `k = v` has `self[k] == v`.
    ///
    /// A filter on a field the record lacks never matches. No filters
    /// matches every record.
    #[must_use]
    pub fn matches(&self, filters: &BTreeMap<String, String>) -> bool {
        filters
            .iter()
            .all(|(field, expected)| self.get(field) == Some(expected.as_str()))
    }

    /// Reads a field through its declared type.
    ///
    /// Returns `Ok(None)` when the record has no value, or an empty value,
    /// for the field.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the table does not declare the field and
    /// `Validation(TypeMismatch)` if the stored string does not parse.
    pub fn typed(&self, table: &TableSchema, field: &str) -> CoreResult<Option<Value>> {
        let def = table.field(field).ok_or_else(|| {
            CoreError::not_found(ObjectKind::Field, format!("{}.{field}", table.name))
        })?;
        let Some(raw) = self.get(field).filter(|v| !v.trim().is_empty()) else {
            return Ok(None);
        };
        def.field_type
            .parse_value(raw)
            .map(Some)
            .ok_or_else(|| {
                ValidationError::TypeMismatch {
                    field: field.to_string(),
                    expected: def.field_type,
                    value: raw.to_string(),
                }
                .into()
            })
    }
}

impl From<BTreeMap<String, String>> for Record {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, FieldType};

    fn filters(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn matches_equality_filters() {
        let record: Record = [("id", "1"), ("name", "ada"), ("age", "36")]
            .into_iter()
            .collect();

        assert!(record.matches(&filters(&[])));
        assert!(record.matches(&filters(&[("name", "ada")])));
        assert!(record.matches(&filters(&[("name", "ada"), ("age", "36")])));
        assert!(!record.matches(&filters(&[("name", "ada"), ("age", "37")])));
        assert!(!record.matches(&filters(&[("email", "")])));
    }

    #[test]
    fn json_is_flat_object() {
        let record: Record = [("id", "1"), ("name", "ada")].into_iter().collect();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"id":"1","name":"ada"}"#);
        assert_eq!(record.id(), Some("1"));
    }

    #[test]
    fn typed_access() {
        let mut table = TableSchema::new("people");
        table.add_field(FieldDef::new("age", FieldType::Int)).unwrap();
        table.add_field(FieldDef::new("born", FieldType::DateTime)).unwrap();

        let record: Record = [("id", "1"), ("age", "36"), ("born", "")]
            .into_iter()
            .collect();

        assert_eq!(record.typed(&table, "age").unwrap(), Some(Value::Int(36)));
        assert_eq!(record.typed(&table, "born").unwrap(), None);
        assert!(record.typed(&table, "ghost").is_err());

        let bad: Record = [("age", "old")].into_iter().collect();
        assert!(matches!(
            bad.typed(&table, "age"),
            Err(CoreError::Validation(ValidationError::TypeMismatch { .. }))
        ));
    }
}
