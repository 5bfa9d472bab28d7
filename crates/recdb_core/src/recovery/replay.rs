//! Finishing an interrupted mutation.

use super::{Action, PendingEntry, RecoveryLog};
use crate::error::{CoreError, CoreResult, ObjectKind};
use crate::record::{RecordId, RecordStore};
use crate::schema::ID_FIELD;
use tracing::{info, warn};

/// What a replayed entry was about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    /// The logged mutation kind.
    pub action: Action,
    /// Table of the affected record.
    pub table: String,
    /// Id of the affected record.
    pub id: String,
}

impl From<&PendingEntry> for ReplaySummary {
    fn from(entry: &PendingEntry) -> Self {
        Self {
            action: entry.action,
            table: entry.table.clone(),
            id: entry.record_id().to_string(),
        }
    }
}

/// Result of [`replay`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// The slot was empty.
    Empty,
    /// The logged mutation was already on disk; the slot was cleared.
    AlreadyApplied(ReplaySummary),
    /// The logged mutation was (re)applied and the slot cleared.
    Applied(ReplaySummary),
}

impl ReplayOutcome {
    /// Returns the summary, unless the slot was empty.
    #[must_use]
    pub fn summary(&self) -> Option<&ReplaySummary> {
        match self {
            Self::Empty => None,
            Self::AlreadyApplied(s) | Self::Applied(s) => Some(s),
        }
    }
}

/// Brings the record files in line with the pending entry, then clears it.
///
/// Safe to run at any time: a second call finds an empty slot.
///
/// The slot is not always cleared. An update whose record has since been
/// deleted cannot be applied, so replay returns `NotFound` and keeps the
/// entry; the caller decides whether to [`RecoveryLog::clear`] it.
///
/// # Errors
///
/// `InvalidLogEntry` for an unreadable slot, which is left as it is.
/// `NotFound` for an update whose record no longer exists, also leaving the
/// slot. Errors from re-applying the mutation are returned unchanged; an
/// I/O error ([`CoreError::is_io`]) means the mutation may still be
/// unapplied.
pub fn replay(log: &RecoveryLog, records: &RecordStore) -> CoreResult<ReplayOutcome> {
    let Some(entry) = log.read()? else {
        return Ok(ReplayOutcome::Empty);
    };
    let summary = ReplaySummary::from(&entry);
    let table = entry.table.as_str();
    let id = entry.record_id();

    let outcome = match entry.action {
        Action::Insert => {
            if records.exists(table, id)? {
                log.clear()?;
                ReplayOutcome::AlreadyApplied(summary)
            } else {
                let mut fields = entry.data.clone().into_map();
                fields.remove(ID_FIELD);
                records.insert_with_id(table, RecordId::new(id)?, &fields)?;
                log.clear()?;
                ReplayOutcome::Applied(summary)
            }
        }
        Action::Update => {
            let stored = records
                .get(table, id)?
                .ok_or_else(|| CoreError::not_found(ObjectKind::Record, format!("{table}/{id}")))?;
            let unchanged = entry
                .data
                .iter()
                .filter(|(field, _)| *field != ID_FIELD)
                .all(|(field, value)| stored.get(field) == Some(value));

            log.clear()?;
            records.update(table, id, entry.data.as_map())?;
            log.clear()?;
            if unchanged {
                ReplayOutcome::AlreadyApplied(summary)
            } else {
                ReplayOutcome::Applied(summary)
            }
        }
        Action::Delete => {
            if records.exists(table, id)? {
                records.delete(table, id)?;
                log.clear()?;
                ReplayOutcome::Applied(summary)
            } else {
                log.clear()?;
                ReplayOutcome::AlreadyApplied(summary)
            }
        }
    };

    match &outcome {
        ReplayOutcome::Applied(s) => {
            warn!(action = %s.action, table = %s.table, id = %s.id, "replayed interrupted mutation");
        }
        ReplayOutcome::AlreadyApplied(s) => {
            info!(action = %s.action, table = %s.table, id = %s.id, "pending mutation was already applied");
        }
        ReplayOutcome::Empty => {}
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryCache;
    use crate::config::CacheMode;
    use crate::dir::DatabaseDir;
    use crate::record::{FieldMap, IdGenerator, Record};
    use crate::schema::{Schema, SchemaStore};
    use recdb_storage::{InMemoryBackend, StorageBackend};
    use std::sync::Arc;

    struct Fixed;

    impl IdGenerator for Fixed {
        fn generate(&self) -> RecordId {
            RecordId::new("fixed").unwrap()
        }
    }

    fn setup() -> (DatabaseDir, RecoveryLog, RecordStore) {
        let dir = DatabaseDir::new("shop", Arc::new(InMemoryBackend::new()));
        dir.initialize().unwrap();
        SchemaStore::new(dir.clone())
            .save(&Schema::parse("[users]\nid:string:pk,unique\nname:string\n").unwrap())
            .unwrap();
        let log = RecoveryLog::new(dir.clone());
        let records = RecordStore::new(
            dir.clone(),
            log.clone(),
            QueryCache::new(dir.clone(), CacheMode::AppendOnly),
            Arc::new(Fixed),
            true,
        );
        (dir, log, records)
    }

    fn name(value: &str) -> FieldMap {
        [("name".to_string(), value.to_string())].into_iter().collect()
    }

    fn entry(action: Action, data: &[(&str, &str)]) -> PendingEntry {
        let data: Record = data.iter().copied().collect();
        PendingEntry::new(action, "shop", "users", data)
    }

    #[test]
    fn empty_slot_is_noop() {
        let (_, log, records) = setup();
        assert_eq!(replay(&log, &records).unwrap(), ReplayOutcome::Empty);
    }

    #[test]
    fn completed_insert_is_already_applied() {
        let (_, log, records) = setup();
        records.insert("users", &name("ada")).unwrap();

        let outcome = replay(&log, &records).unwrap();

        assert!(matches!(outcome, ReplayOutcome::AlreadyApplied(_)));
        assert_eq!(outcome.summary().unwrap().id, "fixed");
        assert_eq!(log.read().unwrap(), None);
        assert_eq!(replay(&log, &records).unwrap(), ReplayOutcome::Empty);
    }

    #[test]
    fn interrupted_insert_is_finished() {
        let (_, log, records) = setup();
        log.write_intent(&entry(Action::Insert, &[("id", "lost"), ("name", "ada")]))
            .unwrap();

        let outcome = replay(&log, &records).unwrap();

        assert!(matches!(outcome, ReplayOutcome::Applied(_)));
        let record = records.get("users", "lost").unwrap().unwrap();
        assert_eq!(record.get("name"), Some("ada"));
        assert_eq!(log.read().unwrap(), None);
    }

    #[test]
    fn interrupted_update_is_reapplied() {
        let (_, log, records) = setup();
        records.insert("users", &name("ada")).unwrap();
        log.write_intent(&entry(Action::Update, &[("id", "fixed"), ("name", "grace")]))
            .unwrap();

        let outcome = replay(&log, &records).unwrap();

        assert!(matches!(outcome, ReplayOutcome::Applied(_)));
        assert_eq!(
            records.get("users", "fixed").unwrap().unwrap().get("name"),
            Some("grace")
        );
        assert_eq!(log.read().unwrap(), None);
    }

    #[test]
    fn completed_update_is_already_applied() {
        let (_, log, records) = setup();
        records.insert("users", &name("ada")).unwrap();
        records.update("users", "fixed", &name("grace")).unwrap();

        let outcome = replay(&log, &records).unwrap();
        assert!(matches!(outcome, ReplayOutcome::AlreadyApplied(_)));
        assert_eq!(log.read().unwrap(), None);
    }

    #[test]
    fn update_of_vanished_record_keeps_slot() {
        let (_, log, records) = setup();
        let pending = entry(Action::Update, &[("id", "gone"), ("name", "x")]);
        log.write_intent(&pending).unwrap();

        let err = replay(&log, &records).unwrap_err();

        assert!(err.is_not_found(ObjectKind::Record));
        assert_eq!(log.read().unwrap(), Some(pending));
    }

    #[test]
    fn delete_replay_both_ways() {
        let (_, log, records) = setup();
        records.insert("users", &name("ada")).unwrap();
        log.write_intent(&entry(Action::Delete, &[("id", "fixed")])).unwrap();

        assert!(matches!(
            replay(&log, &records).unwrap(),
            ReplayOutcome::Applied(_)
        ));
        assert!(!records.exists("users", "fixed").unwrap());

        log.write_intent(&entry(Action::Delete, &[("id", "fixed")])).unwrap();
        assert!(matches!(
            replay(&log, &records).unwrap(),
            ReplayOutcome::AlreadyApplied(_)
        ));
        assert_eq!(log.read().unwrap(), None);
    }

    #[test]
    fn invalid_slot_is_left_alone() {
        let (dir, log, records) = setup();
        let raw = r#"{"action":"merge","dbName":"shop","table":"users","data":{"id":"x"}}"#;
        dir.write_text(&dir.pending_path(), raw).unwrap();

        let err = replay(&log, &records).unwrap_err();

        assert!(matches!(err, CoreError::InvalidLogEntry { .. }));
        let bytes = dir.backend().read(&dir.pending_path()).unwrap().unwrap();
        assert_eq!(bytes, raw.as_bytes());
    }
}
