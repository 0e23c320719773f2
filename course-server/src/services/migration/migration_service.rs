use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use course_blob::{codec, BlobAdapter, BlobHandle, DefaultMediaKeys, MediaKeyStrategy, ObjectStoreChain};
use course_core::{CourseError, CourseResult, PointerRecord, PointerSlot, PointerStore};
use course_queue::RegistryBackend;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::inline_media::{self, InlineMedia};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub courses_scanned: usize,
    pub blobs_scanned: usize,
    pub blobs_rewritten: usize,
    #[serde(rename = "base64Found")]
    pub base64_found: usize,
    pub uploaded: usize,
    pub failed: usize,
    pub bytes_removed: u64,
    pub registry_entries_patched: usize,
    /// Blobs left alone because a newer write moved their pointer mid-run.
    pub pointers_moved: usize,
    pub budget_exhausted: bool,
    pub errors: Vec<String>,
}

/// What happened to one pointer's blob.
#[derive(Debug, Default)]
struct BlobMigration {
    found: usize,
    uploaded: usize,
    failed: usize,
    bytes_removed: u64,
    rewritten: bool,
    pointer_moved: bool,
    registry_patched: usize,
}

/// Moves inline base64 images out of snapshot blobs into object storage.
///
/// Rewritten blobs are re-bound to their pointers with the version left
/// unchanged; the content a version refers to is the same, only smaller.
#[derive(Clone)]
pub struct MigrationService {
    blobs: BlobAdapter,
    pointers: Arc<dyn PointerStore>,
    registry: Arc<dyn RegistryBackend>,
    objects: ObjectStoreChain,
    keys: Arc<dyn MediaKeyStrategy>,
    budget: Duration,
}

impl MigrationService {
    pub fn new(
        blobs: BlobAdapter,
        pointers: Arc<dyn PointerStore>,
        registry: Arc<dyn RegistryBackend>,
        objects: ObjectStoreChain,
    ) -> Self {
        Self {
            blobs,
            pointers,
            registry,
            objects,
            keys: Arc::new(DefaultMediaKeys),
            budget: Duration::from_secs(300),
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_keys<K: MediaKeyStrategy + 'static>(mut self, keys: K) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    /// One pass over every pointer record.
    ///
    /// Failures are counted and logged per image and per blob; only a
    /// failure to list the records fails the run.
    pub async fn run(&self) -> CourseResult<MigrationReport> {
        let deadline = Instant::now() + self.budget;
        let records = self.pointers.list().await.map_err(CourseError::from)?;
        let mut report = MigrationReport::default();

        'courses: for record in records {
            report.courses_scanned += 1;

            for slot in PointerSlot::all() {
                if record.blob_handle(slot).is_none() {
                    continue;
                }
                if Instant::now() >= deadline {
                    warn!(budget = ?self.budget, "Migration budget exhausted, stopping early");
                    report.budget_exhausted = true;
                    break 'courses;
                }

                report.blobs_scanned += 1;
                match self.migrate_blob(&record, slot).await {
                    Ok(done) => {
                        report.base64_found += done.found;
                        report.uploaded += done.uploaded;
                        report.failed += done.failed;
                        report.bytes_removed += done.bytes_removed;
                        report.registry_entries_patched += done.registry_patched;
                        if done.rewritten {
                            report.blobs_rewritten += 1;
                        }
                        if done.pointer_moved {
                            report.pointers_moved += 1;
                        }
                    }
                    Err(e) => {
                        warn!(course_id = %record.course_id, slot = %slot, error = %e, "Skipping blob during migration");
                        report.failed += 1;
                        report.errors.push(format!("{}/{}: {}", record.course_id, slot, e));
                    }
                }
            }
        }

        info!(
            courses = report.courses_scanned,
            base64_found = report.base64_found,
            uploaded = report.uploaded,
            failed = report.failed,
            bytes_removed = report.bytes_removed,
            rewritten = report.blobs_rewritten,
            "Base64 migration finished"
        );
        Ok(report)
    }

    async fn migrate_blob(&self, record: &PointerRecord, slot: PointerSlot) -> CourseResult<BlobMigration> {
        let course_id = record.course_id.as_str();
        let (Some(handle), Some(hash)) = (record.blob_handle(slot), record.hash(slot)) else {
            return Ok(BlobMigration::default());
        };

        let (_, mut course) = self
            .blobs
            .fetch_verified(&BlobHandle::new(handle), hash)
            .await
            .map_err(CourseError::from)?;

        let media = InlineMedia::collect(&course);
        let mut done = BlobMigration {
            found: media.found(),
            ..BlobMigration::default()
        };
        if media.is_empty() {
            return Ok(done);
        }

        let mut urls = BTreeMap::new();
        for (inline, image) in media.images() {
            let digest = codec::content_hash(&image.bytes);
            let key = self.keys.object_key(course_id, &digest, image.extension());
            match self.objects.put(&key, &image.mime, image.bytes.clone()).await {
                Ok(stored) => {
                    debug!(course_id, key = %stored.key, backend = stored.backend, "Inline image uploaded");
                    done.uploaded += 1;
                    urls.insert(inline.clone(), stored.url);
                }
                Err(e) => {
                    warn!(course_id, key = %key, error = %e, "Inline image upload failed, keeping it inline");
                    done.failed += 1;
                }
            }
        }

        let rewritten = inline_media::rewrite(&mut course, &urls);
        if rewritten.leaves == 0 {
            return Ok(done);
        }

        let (_, receipt) = self.blobs.put_course(&course).await.map_err(CourseError::from)?;
        let bound = self
            .pointers
            .backfill(course_id, slot, handle, receipt.handle.as_str(), &receipt.hash)
            .await
            .map_err(CourseError::from)?;
        if !bound {
            warn!(
                course_id,
                slot = %slot,
                old_handle = handle,
                "Pointer moved during migration, leaving it on the newer blob"
            );
            done.pointer_moved = true;
            return Ok(done);
        }
        done.bytes_removed = rewritten.bytes_removed;
        done.registry_patched = self
            .registry
            .rewrite_handle(handle, receipt.handle.as_str(), &receipt.hash)
            .await
            .map_err(CourseError::from)?;
        done.rewritten = true;

        info!(
            course_id,
            slot = %slot,
            old_handle = handle,
            new_handle = %receipt.handle,
            version = record.version(slot),
            "Snapshot blob rewritten without inline media"
        );
        Ok(done)
    }
}
