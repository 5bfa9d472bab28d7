//! The single-slot pending file.

use super::entry::{decode, PendingEntry};
use crate::dir::DatabaseDir;
use crate::error::CoreResult;
use tracing::debug;

/// Owner of a database's `pending.txt`.
///
/// The slot holds at most one entry. Writing an intent overwrites whatever
/// was there, so only the most recent mutation is recoverable.
#[derive(Debug, Clone)]
pub struct RecoveryLog {
    dir: DatabaseDir,
}

impl RecoveryLog {
    /// Creates the log of a database directory.
    pub fn new(dir: DatabaseDir) -> Self {
        Self { dir }
    }

    /// Overwrites the slot with an entry.
    pub fn write_intent(&self, entry: &PendingEntry) -> CoreResult<()> {
        self.dir.write_json(&self.dir.pending_path(), entry)?;
        debug!(
            db = self.dir.name(),
            action = %entry.action,
            table = %entry.table,
            id = entry.record_id(),
            "wrote pending entry"
        );
        Ok(())
    }

    /// Empties the slot.
    pub fn clear(&self) -> CoreResult<()> {
        self.dir.write_text(&self.dir.pending_path(), "")?;
        debug!(db = self.dir.name(), "cleared pending entry");
        Ok(())
    }

    /// Reads the slot.
    ///
    /// A missing or blank file is an empty slot.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLogEntry` if the slot holds something that is not a
    /// replayable entry.
    pub fn read(&self) -> CoreResult<Option<PendingEntry>> {
        let Some(bytes) = self.dir.backend().read(&self.dir.pending_path())? else {
            return Ok(None);
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        decode(&bytes).map(Some)
    }

    /// Returns true if the slot holds anything.
    pub fn is_pending(&self) -> CoreResult<bool> {
        Ok(self
            .dir
            .backend()
            .read(&self.dir.pending_path())?
            .is_some_and(|bytes| !bytes.iter().all(u8::is_ascii_whitespace)))
    }
}
