//! Pointer records: the per-course document in the system of record.
//!
//! Each record holds two independent snapshot pointers. `draft_snapshot`
//! is the unpublished working copy and `published` is the live copy. A
//! pointer's `version` advances by exactly one per successful write to that
//! pointer. Writes carry the version they were computed against and stores
//! refuse them if the pointer moved in between.

mod memory;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::CourseError;
use crate::model::{CourseMeta, Section};

pub use memory::MemoryPointerStore;

/// Which of the two pointers a write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerSlot {
    Draft,
    Published,
}

impl PointerSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointerSlot::Draft => "draft",
            PointerSlot::Published => "published",
        }
    }

    /// Field name of the pointer on the stored record.
    pub fn field_name(&self) -> &'static str {
        match self {
            PointerSlot::Draft => "draft_snapshot",
            PointerSlot::Published => "published",
        }
    }

    pub fn all() -> [PointerSlot; 2] {
        [PointerSlot::Draft, PointerSlot::Published]
    }
}

impl std::fmt::Display for PointerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    #[default]
    Draft,
    Published,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Draft => "draft",
            CourseStatus::Published => "published",
        }
    }
}

/// An uploaded blob, before it is bound to a pointer version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotBlob {
    #[serde(rename = "tg_file_id")]
    pub blob_handle: String,
    pub hash: String,
    pub lesson_count: u64,
    pub block_count: u64,
    #[serde(default)]
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    #[serde(rename = "tg_file_id")]
    pub blob_handle: String,
    pub version: u64,
    pub hash: String,
    pub lesson_count: u64,
    pub block_count: u64,
    #[serde(default)]
    pub size_bytes: u64,
    pub saved_at: DateTime<Utc>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedSnapshot {
    #[serde(rename = "tg_file_id")]
    pub blob_handle: String,
    pub version: u64,
    pub hash: String,
    pub lesson_count: u64,
    pub block_count: u64,
    #[serde(default)]
    pub size_bytes: u64,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerRecord {
    #[serde(rename = "courseId")]
    pub course_id: String,
    #[serde(default)]
    pub meta: CourseMeta,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub draft_snapshot: Option<DraftSnapshot>,
    #[serde(default)]
    pub published: Option<PublishedSnapshot>,
    #[serde(default)]
    pub status: CourseStatus,
    #[serde(default, rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PointerRecord {
    pub fn new(course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            meta: CourseMeta::default(),
            sections: Vec::new(),
            draft_snapshot: None,
            published: None,
            status: CourseStatus::Draft,
            updated_at: None,
        }
    }

    /// `published` if a published pointer exists, else `draft`.
    pub fn derived_status(&self) -> CourseStatus {
        if self.published.is_some() {
            CourseStatus::Published
        } else {
            CourseStatus::Draft
        }
    }

    pub fn version(&self, slot: PointerSlot) -> u64 {
        match slot {
            PointerSlot::Draft => self.draft_snapshot.as_ref().map_or(0, |p| p.version),
            PointerSlot::Published => self.published.as_ref().map_or(0, |p| p.version),
        }
    }

    pub fn blob_handle(&self, slot: PointerSlot) -> Option<&str> {
        match slot {
            PointerSlot::Draft => self.draft_snapshot.as_ref().map(|p| p.blob_handle.as_str()),
            PointerSlot::Published => self.published.as_ref().map(|p| p.blob_handle.as_str()),
        }
    }

    pub fn hash(&self, slot: PointerSlot) -> Option<&str> {
        match slot {
            PointerSlot::Draft => self.draft_snapshot.as_ref().map(|p| p.hash.as_str()),
            PointerSlot::Published => self.published.as_ref().map(|p| p.hash.as_str()),
        }
    }

    /// Apply a write, enforcing the version precondition.
    ///
    /// Only the targeted pointer changes. Publishing stamps the record as
    /// published; a checkpoint leaves the status derived from `published`.
    pub fn apply(&mut self, write: &PointerWrite) -> PointerResult<()> {
        let actual = self.version(write.slot);
        if actual != write.expected_version {
            return Err(PointerStoreError::VersionConflict {
                slot: write.slot,
                expected: write.expected_version,
                actual,
            });
        }

        let version = write.next_version();
        let blob = &write.blob;
        match write.slot {
            PointerSlot::Draft => {
                let dirty = self
                    .published
                    .as_ref()
                    .map_or(true, |p| p.hash != blob.hash);
                self.draft_snapshot = Some(DraftSnapshot {
                    blob_handle: blob.blob_handle.clone(),
                    version,
                    hash: blob.hash.clone(),
                    lesson_count: blob.lesson_count,
                    block_count: blob.block_count,
                    size_bytes: blob.size_bytes,
                    saved_at: write.at,
                    dirty,
                });
                self.status = self.derived_status();
            }
            PointerSlot::Published => {
                self.published = Some(PublishedSnapshot {
                    blob_handle: blob.blob_handle.clone(),
                    version,
                    hash: blob.hash.clone(),
                    lesson_count: blob.lesson_count,
                    block_count: blob.block_count,
                    size_bytes: blob.size_bytes,
                    published_at: write.at,
                });
                self.status = CourseStatus::Published;
            }
        }

        self.meta = write.meta.clone();
        self.sections = write.sections.clone();
        self.updated_at = Some(write.at);
        Ok(())
    }

    /// Repoint a slot at a rewritten blob without touching its version.
    ///
    /// Only applies while the slot still references `from_handle`; returns
    /// `false` and leaves the record alone when a newer write moved it.
    pub fn backfill(
        &mut self,
        slot: PointerSlot,
        from_handle: &str,
        blob_handle: &str,
        hash: &str,
    ) -> PointerResult<bool> {
        let missing = || PointerStoreError::NotFound(format!("{}/{}", self.course_id, slot));
        let (current, current_hash) = match slot {
            PointerSlot::Draft => {
                let pointer = self.draft_snapshot.as_mut().ok_or_else(missing)?;
                (&mut pointer.blob_handle, &mut pointer.hash)
            }
            PointerSlot::Published => {
                let pointer = self.published.as_mut().ok_or_else(missing)?;
                (&mut pointer.blob_handle, &mut pointer.hash)
            }
        };
        if current.as_str() != from_handle {
            return Ok(false);
        }
        *current = blob_handle.to_string();
        *current_hash = hash.to_string();
        self.updated_at = Some(Utc::now());
        Ok(true)
    }
}

/// A pending pointer update, computed against an observed prior version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerWrite {
    pub slot: PointerSlot,
    pub blob: SnapshotBlob,
    pub expected_version: u64,
    pub meta: CourseMeta,
    pub sections: Vec<Section>,
    pub at: DateTime<Utc>,
}

impl PointerWrite {
    pub fn new(slot: PointerSlot, blob: SnapshotBlob, meta: CourseMeta, sections: Vec<Section>) -> Self {
        Self {
            slot,
            blob,
            expected_version: 0,
            meta,
            sections,
            at: Utc::now(),
        }
    }

    /// Compute this write against the record as it currently stands.
    pub fn against(mut self, record: Option<&PointerRecord>) -> Self {
        self.expected_version = record.map_or(0, |r| r.version(self.slot));
        self
    }

    pub fn next_version(&self) -> u64 {
        self.expected_version + 1
    }
}

pub type PointerResult<T> = Result<T, PointerStoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PointerStoreError {
    #[error("Pointer store timed out after {0:?}")]
    Timeout(Duration),

    #[error("Pointer store quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Version conflict on {slot} pointer: expected {expected}, found {actual}")]
    VersionConflict {
        slot: PointerSlot,
        expected: u64,
        actual: u64,
    },

    #[error("Pointer record not found: {0}")]
    NotFound(String),

    #[error("Pointer store unavailable: {0}")]
    Unavailable(String),

    #[error("Pointer store error: {0}")]
    Backend(String),
}

impl PointerStoreError {
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, Self::QuotaExhausted(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

impl From<PointerStoreError> for CourseError {
    fn from(err: PointerStoreError) -> Self {
        let message = err.to_string();
        let base = match &err {
            PointerStoreError::VersionConflict { .. } => CourseError::conflict(message),
            PointerStoreError::NotFound(_) => CourseError::not_found(message),
            _ => CourseError::unavailable(message),
        };
        base.with_source(err.into())
    }
}

/// System of record for pointer records.
#[async_trait]
pub trait PointerStore: Send + Sync {
    /// Load a record, `None` when the course has never been written.
    async fn load(&self, course_id: &str) -> PointerResult<Option<PointerRecord>>;

    /// Apply a write atomically with respect to its expected version.
    async fn write(&self, course_id: &str, write: &PointerWrite) -> PointerResult<PointerRecord>;

    /// Replace a pointer's blob handle and hash, keeping its version, if
    /// the pointer still references `from_handle`. Returns whether it did.
    async fn backfill(
        &self,
        course_id: &str,
        slot: PointerSlot,
        from_handle: &str,
        blob_handle: &str,
        hash: &str,
    ) -> PointerResult<bool>;

    /// Every record in the store.
    async fn list(&self) -> PointerResult<Vec<PointerRecord>>;

    fn name(&self) -> &'static str;
}
