use course_blob::BlobReceipt;
use course_core::{Course, CourseStatus, PointerRecord, PointerSlot};
use serde::Serialize;
use serde_json::{json, Value};

/// Result of a checkpoint or publish.
#[derive(Debug, Clone)]
pub struct SnapshotOutcome {
    pub course_id: String,
    pub slot: PointerSlot,
    pub receipt: BlobReceipt,
    /// New pointer version; `None` while the pointer write is pending
    pub version: Option<u64>,
    pub status: Option<CourseStatus>,
    pub pointer_updated: bool,
    pub pending_sync: bool,
}

impl SnapshotOutcome {
    pub fn applied(course_id: &str, slot: PointerSlot, receipt: BlobReceipt, record: &PointerRecord) -> Self {
        Self {
            course_id: course_id.to_string(),
            slot,
            receipt,
            version: Some(record.version(slot)),
            status: Some(record.status),
            pointer_updated: true,
            pending_sync: false,
        }
    }

    pub fn deferred(course_id: &str, slot: PointerSlot, receipt: BlobReceipt) -> Self {
        Self {
            course_id: course_id.to_string(),
            slot,
            receipt,
            version: None,
            status: None,
            pointer_updated: false,
            pending_sync: true,
        }
    }

    fn version_field(&self) -> &'static str {
        match self.slot {
            PointerSlot::Draft => "draft_version",
            PointerSlot::Published => "version",
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": true,
            "courseId": self.course_id,
            "lessonCount": self.receipt.stats.lesson_count,
            "blockCount": self.receipt.stats.block_count,
            "sizeBytes": self.receipt.stats.size_bytes,
            "tg_file_id": self.receipt.handle.as_str(),
            "hash": self.receipt.hash,
            "firestore_updated": self.pointer_updated,
            "pending_firestore_sync": self.pending_sync,
        });
        body[self.version_field()] = json!(self.version);
        if let Some(status) = self.status {
            body["status"] = json!(status.as_str());
        }
        body
    }
}

/// A decoded snapshot together with the pointer it was loaded through.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotView {
    pub course_id: String,
    pub mode: PointerSlot,
    pub version: u64,
    pub hash: String,
    #[serde(rename = "tg_file_id")]
    pub blob_handle: String,
    pub status: CourseStatus,
    pub course: Course,
}
