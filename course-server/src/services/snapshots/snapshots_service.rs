use std::sync::Arc;
use std::time::Duration;

use course_blob::{codec, BlobAdapter, BlobHandle};
use course_core::{
    Course, CourseError, CourseResult, PointerRecord, PointerResult, PointerSlot, PointerStore,
    PointerStoreError, PointerWrite, WritePolicy,
};
use course_queue::{RegistryBackend, SyncEntry, SyncKey};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::snapshots_shared::{SnapshotOutcome, SnapshotView};

/// Reload-and-retry budget when the caller did not pin a version.
const MAX_CONFLICT_RETRIES: usize = 3;

/// Checkpoint and publish writers.
///
/// The blob upload is the durability anchor: once it succeeds, the
/// snapshot exists. The pointer update that follows is bounded by a
/// timeout, and what happens when it fails is decided by the
/// [`WritePolicy`].
#[derive(Clone)]
pub struct SnapshotWriter {
    blobs: BlobAdapter,
    pointers: Arc<dyn PointerStore>,
    registry: Arc<dyn RegistryBackend>,
    policy: WritePolicy,
    checkpoint_timeout: Duration,
    publish_timeout: Duration,
}

impl SnapshotWriter {
    pub fn new(
        blobs: BlobAdapter,
        pointers: Arc<dyn PointerStore>,
        registry: Arc<dyn RegistryBackend>,
        policy: WritePolicy,
    ) -> Self {
        Self {
            blobs,
            pointers,
            registry,
            policy,
            checkpoint_timeout: Duration::from_secs(5),
            publish_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeouts(mut self, checkpoint: Duration, publish: Duration) -> Self {
        self.checkpoint_timeout = checkpoint;
        self.publish_timeout = publish;
        self
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    /// Write the draft pointer.
    pub async fn checkpoint(&self, course_id: &str, course: Course, expected_version: Option<u64>) -> CourseResult<SnapshotOutcome> {
        self.write(PointerSlot::Draft, course_id, course, expected_version).await
    }

    /// Write the published pointer and mark the course published.
    pub async fn publish(&self, course_id: &str, course: Course, expected_version: Option<u64>) -> CourseResult<SnapshotOutcome> {
        self.write(PointerSlot::Published, course_id, course, expected_version).await
    }

    pub async fn write(
        &self,
        slot: PointerSlot,
        course_id: &str,
        course: Course,
        expected_version: Option<u64>,
    ) -> CourseResult<SnapshotOutcome> {
        let course_id = course_id.trim();
        if course_id.is_empty() {
            return Err(CourseError::validation("courseId is required").into_anyhow());
        }

        let course = course.bind_id(course_id);
        let encoded = codec::encode(&course).map_err(CourseError::from)?;
        let receipt = self.blobs.put(course_id, &encoded).await.map_err(CourseError::from)?;

        let write = PointerWrite::new(
            slot,
            receipt.to_snapshot_blob(),
            encoded.meta.clone(),
            encoded.sections.clone(),
        );

        let limit = self.timeout_for(slot);
        let result = match timeout(limit, self.update_pointer(course_id, &write, expected_version)).await {
            Ok(result) => result,
            Err(_) => Err(PointerStoreError::Timeout(limit)),
        };

        match result {
            Ok(record) => {
                let key = SyncKey::new(course_id, slot);
                if let Err(e) = self.registry.clear(&key, write.at).await {
                    warn!(course_id, slot = %slot, error = %e, "Failed to clear superseded registry entry");
                }
                info!(
                    course_id,
                    slot = %slot,
                    version = record.version(slot),
                    handle = %receipt.handle,
                    "Snapshot pointer updated"
                );
                Ok(SnapshotOutcome::applied(course_id, slot, receipt, &record))
            }
            Err(err) if self.policy.absorbs(&err) => {
                warn!(
                    course_id,
                    slot = %slot,
                    handle = %receipt.handle,
                    error = %err,
                    "Pointer write degraded, queued for sync"
                );
                self.registry
                    .enqueue(SyncEntry::from_write(course_id, &write))
                    .await
                    .map_err(CourseError::from)?;
                Ok(SnapshotOutcome::deferred(course_id, slot, receipt))
            }
            Err(err) => {
                warn!(course_id, slot = %slot, handle = %receipt.handle, error = %err, "Pointer write failed");
                Err(CourseError::from(err).into_anyhow())
            }
        }
    }

    async fn update_pointer(
        &self,
        course_id: &str,
        write: &PointerWrite,
        expected_version: Option<u64>,
    ) -> PointerResult<PointerRecord> {
        if let Some(expected) = expected_version {
            let mut pinned = write.clone();
            pinned.expected_version = expected;
            return self.pointers.write(course_id, &pinned).await;
        }

        let mut attempt = 0;
        loop {
            let current = self.pointers.load(course_id).await?;
            let next = write.clone().against(current.as_ref());
            match self.pointers.write(course_id, &next).await {
                Err(e) if e.is_conflict() && attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    debug!(course_id, attempt, "Pointer moved during write, retrying");
                }
                other => return other,
            }
        }
    }

    fn timeout_for(&self, slot: PointerSlot) -> Duration {
        match slot {
            PointerSlot::Draft => self.checkpoint_timeout,
            PointerSlot::Published => self.publish_timeout,
        }
    }

    /// The pointer record for a course.
    pub async fn pointers(&self, course_id: &str) -> CourseResult<PointerRecord> {
        self.pointers
            .load(course_id)
            .await
            .map_err(CourseError::from)?
            .ok_or_else(|| CourseError::not_found(format!("Course {course_id} has no pointer record")).into_anyhow())
    }

    /// Download and verify the snapshot a pointer references.
    pub async fn load(&self, course_id: &str, slot: PointerSlot) -> CourseResult<SnapshotView> {
        let record = self.pointers(course_id).await?;
        let (Some(handle), Some(hash)) = (record.blob_handle(slot), record.hash(slot)) else {
            return Err(CourseError::not_found(format!("Course {course_id} has no {slot} snapshot")).into_anyhow());
        };

        let (_, course) = self
            .blobs
            .fetch_verified(&BlobHandle::new(handle), hash)
            .await
            .map_err(CourseError::from)?;

        Ok(SnapshotView {
            course_id: course_id.to_string(),
            mode: slot,
            version: record.version(slot),
            hash: hash.to_string(),
            blob_handle: handle.to_string(),
            status: record.derived_status(),
            course,
        })
    }
}
