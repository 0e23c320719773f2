use std::sync::Arc;
use std::time::Duration;

use course_core::{PointerRecord, PointerSlot, PointerStore, PointerStoreError};
use serde::Serialize;
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

use crate::{backend::RegistryBackend, QueueResult, SyncEntry};

/// Outcome of one sweep over the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    pub remaining: usize,
    pub quota_exhausted: bool,
    pub errors: Vec<SweepFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
    pub course_id: String,
    pub slot: PointerSlot,
    pub error: String,
}

enum Replay {
    Written(u64),
    AlreadyApplied,
    Superseded,
}

/// Replays deferred pointer writes against the system of record
#[derive(Clone)]
pub struct SyncSweeper {
    registry: Arc<dyn RegistryBackend>,
    pointers: Arc<dyn PointerStore>,
    write_timeout: Duration,
}

impl SyncSweeper {
    pub fn new(registry: Arc<dyn RegistryBackend>, pointers: Arc<dyn PointerStore>) -> Self {
        Self {
            registry,
            pointers,
            write_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn registry(&self) -> &Arc<dyn RegistryBackend> {
        &self.registry
    }

    pub async fn pending_sync_count(&self) -> QueueResult<usize> {
        self.registry.pending_count().await
    }

    /// Re-attempt every pending entry once.
    ///
    /// A quota error stops the sweep: every later write would hit the same
    /// wall. Other failures are recorded on the entry and the sweep moves on.
    /// Entries are never dropped because a replay failed.
    pub async fn sync_pending_courses(&self) -> QueueResult<SweepSummary> {
        let pending = self.registry.pending().await?;
        let mut summary = SweepSummary::default();

        for entry in pending {
            summary.attempted += 1;
            let key = entry.key();

            match self.replay(&entry).await {
                Ok(outcome) => {
                    match outcome {
                        Replay::Written(version) => {
                            debug!(course_id = %entry.course_id, slot = %entry.slot, version, "Deferred pointer write synced")
                        }
                        Replay::AlreadyApplied => {
                            debug!(course_id = %entry.course_id, slot = %entry.slot, "Pointer already references pending blob")
                        }
                        Replay::Superseded => {
                            debug!(course_id = %entry.course_id, slot = %entry.slot, "Pending write superseded by a newer pointer")
                        }
                    }
                    self.registry.mark_synced(&key, entry.blob_handle()).await?;
                    summary.synced += 1;
                }
                Err(err) => {
                    summary.failed += 1;
                    self.registry.record_failure(&key, &err.to_string()).await?;
                    summary.errors.push(SweepFailure {
                        course_id: entry.course_id.clone(),
                        slot: entry.slot,
                        error: err.to_string(),
                    });
                    if err.is_quota_exhausted() {
                        warn!(course_id = %entry.course_id, "Pointer store quota exhausted, stopping sweep");
                        summary.quota_exhausted = true;
                        break;
                    }
                    warn!(course_id = %entry.course_id, slot = %entry.slot, error = %err, "Deferred pointer write failed");
                }
            }
        }

        self.registry.compact().await?;
        summary.remaining = self.registry.pending_count().await?;

        if summary.attempted > 0 {
            info!(
                attempted = summary.attempted,
                synced = summary.synced,
                failed = summary.failed,
                remaining = summary.remaining,
                quota_exhausted = summary.quota_exhausted,
                "Sync sweep finished"
            );
        }
        Ok(summary)
    }

    async fn replay(&self, entry: &SyncEntry) -> Result<Replay, PointerStoreError> {
        let record = self.bounded(self.pointers.load(&entry.course_id)).await?;

        if let Some(record) = &record {
            if record.blob_handle(entry.slot) == Some(entry.blob_handle()) {
                return Ok(Replay::AlreadyApplied);
            }
            if newer_than_entry(record, entry) {
                return Ok(Replay::Superseded);
            }
        }

        let write = entry.to_write().against(record.as_ref());
        let written = self.bounded(self.pointers.write(&entry.course_id, &write)).await?;
        Ok(Replay::Written(written.version(entry.slot)))
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, PointerStoreError>>,
    ) -> Result<T, PointerStoreError> {
        timeout(self.write_timeout, fut)
            .await
            .map_err(|_| PointerStoreError::Timeout(self.write_timeout))?
    }

    /// Run a sweep on every tick until the task is dropped
    pub async fn start(self, every: Duration) {
        let mut ticker = interval(every);

        info!("Starting sync sweeper with interval: {:?}", every);

        loop {
            ticker.tick().await;
            if let Err(e) = self.sync_pending_courses().await {
                warn!("Error during sync sweep: {}", e);
            }
        }
    }
}

/// Whether the pointer moved on after the entry's write was attempted.
fn newer_than_entry(record: &PointerRecord, entry: &SyncEntry) -> bool {
    let stamped = match entry.slot {
        PointerSlot::Draft => record.draft_snapshot.as_ref().map(|p| p.saved_at),
        PointerSlot::Published => record.published.as_ref().map(|p| p.published_at),
    };
    stamped.is_some_and(|at| at > entry.written_at)
}
