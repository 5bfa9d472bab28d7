//! Field definitions.

use crate::dir::validate_name;
use crate::error::ValidationError;
use crate::schema::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fmt;
use std::str::FromStr;

/// Name of the built-in primary key field present in every table.
pub const ID_FIELD: &str = "id";

/// Suffix that marks a field as a reference to another table's `id`.
pub const FOREIGN_KEY_SUFFIX: &str = "_id";

/// Declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 64-bit signed integer.
    Int,
    /// Arbitrary text.
    String,
    /// 64-bit float.
    Float,
    /// `true` / `false`.
    Bool,
    /// Date or date and time.
    DateTime,
}

impl FieldType {
    /// All allowed types, in schema spelling order.
    pub const ALL: [FieldType; 5] = [
        Self::Int,
        Self::String,
        Self::Float,
        Self::Bool,
        Self::DateTime,
    ];

    /// Returns the schema spelling of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::String => "string",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::DateTime => "datetime",
        }
    }

    /// Parses a stored string as a value of this type.
    ///
    /// Booleans accept `true`/`false`/`1`/`0` in any case. Datetimes accept
    /// RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and `YYYY-MM-DD`.
    ///
    /// Returns `None` if the string is not a valid value of this type.
    #[must_use]
    pub fn parse_value(self, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        match self {
            Self::Int => raw.parse().ok().map(Value::Int),
            Self::String => Some(Value::String(raw.to_string())),
            Self::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float),
            Self::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            Self::DateTime => parse_datetime(raw).map(Value::DateTime),
        }
    }
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidType {
                field_type: s.to_string(),
            })
    }
}

/// An option attached to a field definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldOption {
    /// `pk`
    PrimaryKey,
    /// `unique`
    Unique,
    /// `fk=<table>.<field>`; the target is kept verbatim.
    ForeignKey(String),
}

impl FieldOption {
    /// Returns the referenced table of a foreign-key option.
    #[must_use]
    pub fn foreign_table(&self) -> Option<&str> {
        match self {
            Self::ForeignKey(target) => target.split('.').next(),
            _ => None,
        }
    }
}

impl fmt::Display for FieldOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryKey => f.write_str("pk"),
            Self::Unique => f.write_str("unique"),
            Self::ForeignKey(target) => write!(f, "fk={target}"),
        }
    }
}

impl FromStr for FieldOption {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pk" => Ok(Self::PrimaryKey),
            "unique" => Ok(Self::Unique),
            _ => match s.strip_prefix("fk=") {
                Some(target) => Ok(Self::ForeignKey(target.to_string())),
                None => Err(ValidationError::InvalidOption {
                    option: s.to_string(),
                }),
            },
        }
    }
}

/// One column of a table: name, declared type and options.
///
/// Rendered in the schema file as `name:type` or `name:type:opt1,opt2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name, unique within its table.
    pub name: String,
    /// Declared type.
    pub field_type: FieldType,
    /// Options without duplicates, in declaration order.
    pub options: Vec<FieldOption>,
}

impl FieldDef {
    /// Creates a field without options.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            options: Vec::new(),
        }
    }

    /// Adds an option unless it is already present.
    #[must_use]
    pub fn with_option(mut self, option: FieldOption) -> Self {
        if !self.options.contains(&option) {
            self.options.push(option);
        }
        self
    }

    /// The built-in `id:string:pk,unique` field.
    #[must_use]
    pub fn id() -> Self {
        Self::new(ID_FIELD, FieldType::String)
            .with_option(FieldOption::PrimaryKey)
            .with_option(FieldOption::Unique)
    }

    /// A `<table>_id:string:fk=<table>.id` reference field.
    #[must_use]
    pub fn reference_to(table: &str) -> Self {
        Self::new(format!("{table}{FOREIGN_KEY_SUFFIX}"), FieldType::String)
            .with_option(FieldOption::ForeignKey(format!("{table}.{ID_FIELD}")))
    }

    /// Parses and validates a `name:type[:options]` definition.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn parse(definition: &str) -> Result<Self, ValidationError> {
        let definition = definition.trim();
        let parts: Vec<&str> = definition.split(':').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(ValidationError::Malformed {
                definition: definition.to_string(),
            });
        }

        let name = parts[0].trim();
        validate_name(name)?;
        let field_type: FieldType = parts[1].trim().parse()?;

        let mut field = Self::new(name, field_type);
        if let Some(options) = parts.get(2) {
            for option in options.split(',') {
                field = field.with_option(option.trim().parse()?);
            }
        }
        Ok(field)
    }

    /// Returns true if this is the built-in `id` field.
    #[must_use]
    pub fn is_id(&self) -> bool {
        self.name == ID_FIELD
    }

    /// Returns true if the field carries the `pk` option.
    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.options.contains(&FieldOption::PrimaryKey)
    }

    /// Returns true if the field carries the `unique` option.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.options.contains(&FieldOption::Unique)
    }

    /// Returns the table this field references by naming convention.
    ///
    /// A field named `<table>_id` references `<table>`. Referential integrity
    /// is checked against this, not against the `fk=` option.
    #[must_use]
    pub fn referenced_table(&self) -> Option<&str> {
        referenced_table(&self.name)
    }
}

/// Returns `<table>` for a field named `<table>_id`.
#[must_use]
pub fn referenced_table(field: &str) -> Option<&str> {
    field
        .strip_suffix(FOREIGN_KEY_SUFFIX)
        .filter(|table| !table.is_empty())
}

impl fmt::Display for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.field_type)?;
        for (i, option) in self.options.iter().enumerate() {
            let sep = if i == 0 { ':' } else { ',' };
            write!(f, "{sep}{option}")?;
        }
        Ok(())
    }
}

impl FromStr for FieldDef {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Validates a `name:type[:options]` field definition.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidType`] for an unknown type,
/// [`ValidationError::InvalidOption`] for an unknown option, and
/// [`ValidationError::Malformed`] when the definition has the wrong shape.
pub fn validate_field_definition(definition: &str) -> Result<FieldDef, ValidationError> {
    FieldDef::parse(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_simple() {
        let field = FieldDef::parse("name:string").unwrap();
        assert_eq!(field.name, "name");
        assert_eq!(field.field_type, FieldType::String);
        assert!(field.options.is_empty());
    }

    #[test]
    fn parse_with_options() {
        let field = FieldDef::parse("users_id:string:unique,fk=users.id").unwrap();
        assert!(field.is_unique());
        assert_eq!(
            field.options[1],
            FieldOption::ForeignKey("users.id".to_string())
        );
        assert_eq!(field.options[1].foreign_table(), Some("users"));
        assert_eq!(field.referenced_table(), Some("users"));
    }

    #[test]
    fn parse_rejects_bad_type() {
        assert_eq!(
            validate_field_definition("age:integer"),
            Err(ValidationError::InvalidType {
                field_type: "integer".to_string()
            })
        );
    }

    #[test]
    fn parse_rejects_bad_option() {
        assert_eq!(
            validate_field_definition("age:int:indexed"),
            Err(ValidationError::InvalidOption {
                option: "indexed".to_string()
            })
        );
        assert!(matches!(
            validate_field_definition("age:int:"),
            Err(ValidationError::InvalidOption { .. })
        ));
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(matches!(
            validate_field_definition("age"),
            Err(ValidationError::Malformed { .. })
        ));
        assert!(matches!(
            validate_field_definition("a:int:pk:extra"),
            Err(ValidationError::Malformed { .. })
        ));
        assert_eq!(
            validate_field_definition(":int"),
            Err(ValidationError::EmptyName)
        );
    }

    #[test]
    fn duplicate_options_collapse() {
        let field = FieldDef::parse("id:string:pk,pk,unique").unwrap();
        assert_eq!(field.to_string(), "id:string:pk,unique");
    }

    #[test]
    fn id_and_reference_fields() {
        assert_eq!(FieldDef::id().to_string(), "id:string:pk,unique");
        assert!(FieldDef::id().is_primary_key());
        assert_eq!(
            FieldDef::reference_to("users").to_string(),
            "users_id:string:fk=users.id"
        );
    }

    #[test]
    fn referenced_table_convention() {
        assert_eq!(referenced_table("author_id"), Some("author"));
        assert_eq!(referenced_table("_id"), None);
        assert_eq!(referenced_table("id"), None);
        assert_eq!(referenced_table("identity"), None);
    }

    #[test]
    fn typed_values() {
        assert_eq!(FieldType::Int.parse_value("42"), Some(Value::Int(42)));
        assert_eq!(FieldType::Int.parse_value("4.2"), None);
        assert_eq!(FieldType::Float.parse_value("4.5"), Some(Value::Float(4.5)));
        assert_eq!(FieldType::Float.parse_value("NaN"), None);
        assert_eq!(FieldType::Bool.parse_value("TRUE"), Some(Value::Bool(true)));
        assert_eq!(FieldType::Bool.parse_value("yes"), None);
        assert!(FieldType::DateTime.parse_value("2024-03-01").is_some());
        assert!(FieldType::DateTime.parse_value("2024-03-01 10:20:30").is_some());
        assert!(FieldType::DateTime
            .parse_value("2024-03-01T10:20:30+02:00")
            .is_some());
        assert!(FieldType::DateTime.parse_value("yesterday").is_none());
    }

    proptest! {
        #[test]
        fn display_parse_round_trip(
            name in "[a-z][a-z0-9_]{0,12}",
            type_idx in 0usize..5,
            pk in any::<bool>(),
            unique in any::<bool>(),
        ) {
            let mut field = FieldDef::new(name, FieldType::ALL[type_idx]);
            if pk {
                field = field.with_option(FieldOption::PrimaryKey);
            }
            if unique {
                field = field.with_option(FieldOption::Unique);
            }
            let parsed = FieldDef::parse(&field.to_string()).unwrap();
            prop_assert_eq!(parsed, field);
        }

        #[test]
        fn unknown_types_rejected(ty in "[a-z]{1,10}") {
            prop_assume!(!FieldType::ALL.iter().any(|t| t.as_str() == ty));
            let is_invalid_type = matches!(
                validate_field_definition(&format!("f:{ty}")),
                Err(ValidationError::InvalidType { .. })
            );
            prop_assert!(is_invalid_type);
        }
    }
}
