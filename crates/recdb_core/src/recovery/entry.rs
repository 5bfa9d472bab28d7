//! Pending entry format.

use crate::error::{CoreError, CoreResult};
use crate::record::{Record, RecordId};
use crate::schema::ID_FIELD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The mutation a pending entry announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// A record file is about to be created.
    Insert,
    /// A record file is about to be overwritten.
    Update,
    /// A record file is about to be removed.
    Delete,
}

impl Action {
    /// Returns the on-disk spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The intent of a single record mutation, recorded before it happens.
///
/// For inserts and updates `data` is the full record that will be written;
/// for deletes it holds only the id.
///
/// ```json
/// {"action": "insert", "dbName": "shop", "table": "users", "data": {"id": "…", "name": "ada"}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPendingEntry")]
pub struct PendingEntry {
    /// The mutation kind.
    pub action: Action,
    /// Database the mutation belongs to.
    #[serde(rename = "dbName")]
    pub db_name: String,
    /// Table the mutation belongs to.
    pub table: String,
    /// Record payload; always carries a valid `id`.
    pub data: Record,
}

impl PendingEntry {
    /// Creates an entry.
    pub fn new(
        action: Action,
        db_name: impl Into<String>,
        table: impl Into<String>,
        data: Record,
    ) -> Self {
        Self {
            action,
            db_name: db_name.into(),
            table: table.into(),
            data,
        }
    }

    /// Creates a delete entry carrying only the id.
    pub fn delete(db_name: impl Into<String>, table: impl Into<String>, id: &RecordId) -> Self {
        let data = [(ID_FIELD, id.as_str())].into_iter().collect();
        Self::new(Action::Delete, db_name, table, data)
    }

    /// Returns the id of the affected record.
    #[must_use]
    pub fn record_id(&self) -> &str {
        self.data.id().unwrap_or_default()
    }
}

/// Untrusted shape of the pending file, checked on conversion.
#[derive(Deserialize)]
struct RawPendingEntry {
    action: String,
    #[serde(rename = "dbName", default)]
    db_name: String,
    table: String,
    #[serde(default)]
    data: BTreeMap<String, String>,
}

impl TryFrom<RawPendingEntry> for PendingEntry {
    type Error = String;

    fn try_from(raw: RawPendingEntry) -> Result<Self, Self::Error> {
        let action =
            Action::parse(&raw.action).ok_or_else(|| format!("unknown action `{}`", raw.action))?;
        if raw.table.is_empty() {
            return Err("missing table".to_string());
        }
        let id = raw
            .data
            .get(ID_FIELD)
            .ok_or_else(|| "missing record id".to_string())?;
        RecordId::new(id.as_str()).map_err(|e| format!("bad record id: {e}"))?;
        Ok(Self {
            action,
            db_name: raw.db_name,
            table: raw.table,
            data: Record::from(raw.data),
        })
    }
}

/// Decodes the content of a pending file.
pub(crate) fn decode(bytes: &[u8]) -> CoreResult<PendingEntry> {
    serde_json::from_slice(bytes).map_err(|e| CoreError::invalid_log_entry(e.to_string()))
}
