use chrono::{DateTime, Utc};
use course_core::{CourseMeta, PointerSlot, PointerWrite, Section, SnapshotBlob};
use serde::{Deserialize, Serialize};

/// Identity of a deferred write. Entries with the same key collapse to the
/// most recent write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncKey {
    pub course_id: String,
    pub slot: PointerSlot,
}

impl SyncKey {
    pub fn new(course_id: impl Into<String>, slot: PointerSlot) -> Self {
        Self {
            course_id: course_id.into(),
            slot,
        }
    }
}

impl std::fmt::Display for SyncKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.course_id, self.slot)
    }
}

/// A pointer write that did not reach the system of record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEntry {
    pub course_id: String,
    pub slot: PointerSlot,
    pub blob: SnapshotBlob,
    pub meta: CourseMeta,
    pub sections: Vec<Section>,
    /// When the original write was attempted
    pub written_at: DateTime<Utc>,
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
}

impl SyncEntry {
    /// Capture a failed write for later replay.
    pub fn from_write(course_id: impl Into<String>, write: &PointerWrite) -> Self {
        Self {
            course_id: course_id.into(),
            slot: write.slot,
            blob: write.blob.clone(),
            meta: write.meta.clone(),
            sections: write.sections.clone(),
            written_at: write.at,
            synced: false,
            attempts: 0,
            last_error: None,
            synced_at: None,
        }
    }

    pub fn key(&self) -> SyncKey {
        SyncKey::new(self.course_id.clone(), self.slot)
    }

    pub fn blob_handle(&self) -> &str {
        &self.blob.blob_handle
    }

    /// Rebuild the write so it can be replayed against the current record.
    pub fn to_write(&self) -> PointerWrite {
        let mut write = PointerWrite::new(self.slot, self.blob.clone(), self.meta.clone(), self.sections.clone());
        write.at = self.written_at;
        write
    }
}
