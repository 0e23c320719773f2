pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{QueueResult, SyncEntry, SyncKey};

/// Backend trait for the local registry of deferred pointer writes.
///
/// The registry is a write-ahead buffer in front of a quota-constrained
/// system of record. Entries are never dropped because a replay failed;
/// they leave the registry only once synced or superseded.
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// Add an entry, replacing any pending entry with the same key
    async fn enqueue(&self, entry: SyncEntry) -> QueueResult<()>;

    /// Unsynced entries, ordered by key
    async fn pending(&self) -> QueueResult<Vec<SyncEntry>>;

    async fn get(&self, key: &SyncKey) -> QueueResult<Option<SyncEntry>>;

    /// Mark an entry synced if it still refers to `blob_handle`.
    ///
    /// Returns `false` when a newer write replaced the entry meanwhile.
    async fn mark_synced(&self, key: &SyncKey, blob_handle: &str) -> QueueResult<bool>;

    /// Record a failed replay attempt
    async fn record_failure(&self, key: &SyncKey, error: &str) -> QueueResult<()>;

    /// Drop the entry for `key` because a write made at `at` reached the
    /// system of record. An entry written after `at` is newer and stays.
    async fn clear(&self, key: &SyncKey, at: DateTime<Utc>) -> QueueResult<bool>;

    /// Point entries at a rewritten blob. Returns how many entries changed.
    async fn rewrite_handle(&self, old_handle: &str, new_handle: &str, new_hash: &str) -> QueueResult<usize>;

    /// Remove synced entries. Returns how many were removed.
    async fn compact(&self) -> QueueResult<usize>;

    async fn pending_count(&self) -> QueueResult<usize>;

    fn name(&self) -> &'static str;
}
