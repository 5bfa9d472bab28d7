//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use proptest::prelude::*;
use recdb_core::{FieldMap, FieldType};

/// Strategy for generating valid table, field and database names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}")
        .expect("Invalid regex")
        .prop_filter("Name must not look like a reference", |s| !s.ends_with("_id"))
}

/// Strategy for generating declared field types.
pub fn field_type_strategy() -> impl Strategy<Value = FieldType> {
    prop::sample::select(FieldType::ALL.to_vec())
}

/// Strategy for generating `name:type[:options]` definitions that pass
/// validation.
pub fn field_definition_strategy() -> impl Strategy<Value = String> {
    (
        name_strategy().prop_filter("id is built in", |n| n != "id"),
        field_type_strategy(),
        prop::option::of(prop::sample::select(vec!["pk", "unique", "pk,unique"])),
    )
        .prop_map(|(name, ty, options)| match options {
            Some(options) => format!("{name}:{ty}:{options}"),
            None => format!("{name}:{ty}"),
        })
}

/// Strategy for generating one `users` row with a small-alphabet `name` and
/// `city`, so that equality filters hit often.
pub fn user_fields_strategy() -> impl Strategy<Value = FieldMap> {
    (
        prop::sample::select(vec!["ada", "bob", "cy"]),
        prop::sample::select(vec!["paris", "oslo"]),
    )
        .prop_map(|(name, city)| {
            let mut fields = FieldMap::new();
            fields.insert("name".to_string(), name.to_string());
            fields.insert("city".to_string(), city.to_string());
            fields
        })
}

/// Strategy for generating equality filters over the fields produced by
/// [`user_fields_strategy`].
pub fn user_filter_strategy() -> impl Strategy<Value = FieldMap> {
    (
        prop::option::of(prop::sample::select(vec!["ada", "bob", "cy", "dan"])),
        prop::option::of(prop::sample::select(vec!["paris", "oslo"])),
    )
        .prop_map(|(name, city)| {
            let mut filters = FieldMap::new();
            if let Some(name) = name {
                filters.insert("name".to_string(), name.to_string());
            }
            if let Some(city) = city {
                filters.insert("city".to_string(), city.to_string());
            }
            filters
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use recdb_core::validate_field_definition;

    proptest! {
        #[test]
        fn generated_definitions_validate(def in field_definition_strategy()) {
            prop_assert!(validate_field_definition(&def).is_ok());
        }

        #[test]
        fn generated_names_are_valid(name in name_strategy()) {
            prop_assert!(recdb_core::validate_name(&name).is_ok());
        }
    }
}
