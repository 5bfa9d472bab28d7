//! Typed view of stored record values.

use chrono::NaiveDateTime;
use std::fmt;

/// A record value interpreted through its declared [`FieldType`].
///
/// Records are stored as strings; `Value` is what callers get back when they
/// ask for a field through the schema.
///
/// [`FieldType`]: crate::schema::FieldType
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An `int` field.
    Int(i64),
    /// A `string` field.
    String(String),
    /// A `float` field.
    Float(f64),
    /// A `bool` field.
    Bool(bool),
    /// A `datetime` field, normalized to UTC.
    DateTime(NaiveDateTime),
}

impl Value {
    /// Returns the integer, if this is an `Int`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text, if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the float, if this is a `Float`.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the boolean, if this is a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the timestamp, if this is a `DateTime`.
    #[must_use]
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    #[test]
    fn accessors_match_variant() {
        let value = FieldType::Int.parse_value("7").unwrap();
        assert_eq!(value.as_int(), Some(7));
        assert_eq!(value.as_str(), None);
        assert_eq!(value.as_bool(), None);
    }

    #[test]
    fn datetime_display_is_normalized() {
        let value = FieldType::DateTime
            .parse_value("2024-03-01T10:20:30+02:00")
            .unwrap();
        assert_eq!(value.to_string(), "2024-03-01 08:20:30");
        assert!(value.as_datetime().is_some());
    }
}
