//! # RecDB Core
//!
//! A single-user, file-backed record store.
//!
//! Each database is a directory holding:
//! - a text schema of `[Table]` sections and `name:type[:options]` fields
//! - one JSON file per record under `data/<table>/`
//! - a single-slot recovery log (`pending.txt`) written before every record
//!   mutation, so an interrupted mutation can be finished with
//!   [`Database::replay`]
//! - a select-result cache (`cache.txt`) keyed by the exact query
//!
//! Fields named `<table>_id` are references: a non-empty value must name an
//! existing record of that table.
//!
//! ## Example
//!
//! ```rust
//! use recdb_core::{Database, Relation};
//! use std::collections::BTreeMap;
//!
//! let db = Database::open_in_memory("shop").unwrap();
//! db.add_table("users").unwrap();
//! db.add_field("users", "name:string").unwrap();
//! db.add_table("orders").unwrap();
//! db.link_tables("users", "orders", Relation::OneToMany).unwrap();
//!
//! let mut user = BTreeMap::new();
//! user.insert("name".to_string(), "ada".to_string());
//! let id = db.insert("users", &user).unwrap();
//!
//! let mut order = BTreeMap::new();
//! order.insert("users_id".to_string(), id.to_string());
//! db.insert("orders", &order).unwrap();
//!
//! let orders = db.select("orders", &order).unwrap();
//! assert_eq!(orders.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod catalog;
mod config;
mod database;
mod dir;
mod error;
mod record;
pub mod recovery;
pub mod schema;
mod table;

pub use cache::{CachedSelect, QueryCache, SelectQuery};
pub use catalog::Catalog;
pub use config::{CacheMode, Config};
pub use database::Database;
pub use dir::{validate_name, DatabaseDir};
pub use error::{CoreError, CoreResult, ObjectKind, ValidationError};
pub use record::{FieldMap, IdGenerator, Record, RecordId, RecordStore, UuidGenerator};
pub use recovery::{Action, PendingEntry, RecoveryLog, ReplayOutcome, ReplaySummary};
pub use schema::{
    validate_field_definition, FieldDef, FieldOption, FieldType, Schema, SchemaStore,
    TableSchema, Value,
};
pub use table::{Link, Relation, TableManager};
