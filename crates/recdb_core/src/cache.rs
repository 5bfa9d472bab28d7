//! Select-result cache.
//!
//! `cache.txt` holds a JSON array of `{query, result}` pairs. A select whose
//! database, table and filter map are structurally equal to a stored query
//! returns the stored result without scanning the table.
//!
//! In [`CacheMode::AppendOnly`] entries are never invalidated, so a repeated
//! select can return records that were changed or deleted since.

use crate::config::CacheMode;
use crate::dir::DatabaseDir;
use crate::error::CoreResult;
use crate::record::Record;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// The shape of a select: database, table and equality filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectQuery {
    /// Database name.
    #[serde(rename = "dbName")]
    pub db_name: String,
    /// Table name.
    pub table: String,
    /// Field to required value.
    #[serde(rename = "where", default, deserialize_with = "null_as_default")]
    pub filters: BTreeMap<String, String>,
}

impl SelectQuery {
    /// Creates a query.
    pub fn new(
        db_name: impl Into<String>,
        table: impl Into<String>,
        filters: BTreeMap<String, String>,
    ) -> Self {
        Self {
            db_name: db_name.into(),
            table: table.into(),
            filters,
        }
    }
}

/// One cached select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSelect {
    /// The query.
    pub query: SelectQuery,
    /// Records returned when the query first ran.
    #[serde(default, deserialize_with = "null_as_default")]
    pub result: Vec<Record>,
}

/// `null` where a map or list is expected is read as empty.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Owner of a database's `cache.txt`.
#[derive(Debug, Clone)]
pub struct QueryCache {
    dir: DatabaseDir,
    mode: CacheMode,
}

impl QueryCache {
    /// Creates the cache of a database directory.
    pub fn new(dir: DatabaseDir, mode: CacheMode) -> Self {
        Self { dir, mode }
    }

    /// Returns the cache mode.
    #[must_use]
    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    /// Returns every stored entry in file order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the file is not a JSON array of entries.
    pub fn entries(&self) -> CoreResult<Vec<CachedSelect>> {
        Ok(self
            .dir
            .read_json(&self.dir.cache_path())?
            .unwrap_or_default())
    }

    fn store(&self, entries: &[CachedSelect]) -> CoreResult<()> {
        self.dir.write_json(&self.dir.cache_path(), &entries)
    }

    /// Returns the result of the first entry whose query equals `query`.
    pub fn lookup(&self, query: &SelectQuery) -> CoreResult<Option<Vec<Record>>> {
        if self.mode == CacheMode::Disabled {
            return Ok(None);
        }
        let hit = self
            .entries()?
            .into_iter()
            .find(|entry| entry.query == *query)
            .map(|entry| entry.result);
        trace!(table = %query.table, hit = hit.is_some(), "cache lookup");
        Ok(hit)
    }

    /// Appends an entry unless an equal query is already stored.
    pub fn save(&self, query: &SelectQuery, result: &[Record]) -> CoreResult<()> {
        if self.mode == CacheMode::Disabled {
            return Ok(());
        }
        let mut entries = self.entries()?;
        if entries.iter().any(|entry| entry.query == *query) {
            return Ok(());
        }
        entries.push(CachedSelect {
            query: query.clone(),
            result: result.to_vec(),
        });
        self.store(&entries)?;
        debug!(table = %query.table, rows = result.len(), "cached select");
        Ok(())
    }

    /// Drops every entry for a table. Returns how many were dropped.
    pub fn invalidate_table(&self, table: &str) -> CoreResult<usize> {
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|entry| entry.query.table != table);
        let dropped = before - entries.len();
        if dropped > 0 {
            self.store(&entries)?;
            debug!(table, dropped, "invalidated cached selects");
        }
        Ok(dropped)
    }

    /// Empties the cache file.
    pub fn clear(&self) -> CoreResult<()> {
        self.dir.write_text(&self.dir.cache_path(), "")
    }

    /// Reacts to a committed mutation of `table` according to the mode.
    pub(crate) fn on_write(&self, table: &str) -> CoreResult<()> {
        if self.mode == CacheMode::InvalidateOnWrite {
            self.invalidate_table(table)?;
        }
        Ok(())
    }
}
