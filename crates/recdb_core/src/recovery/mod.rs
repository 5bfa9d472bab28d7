//! Single-slot recovery log.
//!
//! Before any record file is created, overwritten or removed, the intended
//! mutation is written to `pending.txt`. After a crash, [`replay`] inspects
//! that entry and either confirms the mutation reached disk or applies it.
//!
//! The slot is not cleared after a successful mutation; it is cleared by
//! replay. Only the latest mutation is ever recoverable.

mod entry;
mod log;
mod replay;

pub use entry::{Action, PendingEntry};
pub use log::RecoveryLog;
pub use replay::{replay, ReplayOutcome, ReplaySummary};
