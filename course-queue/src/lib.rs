//! # course-queue: write-ahead registry for deferred pointer writes
//!
//! When the system of record is slow or out of quota, snapshot writers
//! record the pointer write here instead of failing. The [`SyncSweeper`]
//! replays pending entries later, from a cron route or a background task.
//!
//! - Entries are keyed by course and pointer slot; a newer write for the
//!   same key replaces the older one
//! - A failed replay is recorded on the entry, never dropped
//! - Replays are idempotent: an entry whose blob the pointer already
//!   references is marked synced without a write

pub mod backend;
mod entry;
pub mod error;
mod sweeper;

pub use backend::file::FileRegistry;
pub use backend::memory::MemoryRegistry;
pub use backend::RegistryBackend;
pub use entry::{SyncEntry, SyncKey};
pub use error::{QueueError, QueueResult};
pub use sweeper::{SweepFailure, SweepSummary, SyncSweeper};
