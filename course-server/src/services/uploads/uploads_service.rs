use bytes::Bytes;
use course_blob::{ChunkedUploadCoordinator, Operation, UploadId};
use course_core::{CourseError, CourseResult, PointerSlot};
use serde_json::{json, Value};

use crate::services::snapshots::SnapshotWriter;

/// The `upload-chunked` actions: init, chunk, complete.
///
/// A completed upload is handed to the snapshot writer named by the
/// session's operation.
#[derive(Clone)]
pub struct UploadService {
    coordinator: ChunkedUploadCoordinator,
    snapshots: SnapshotWriter,
}

impl UploadService {
    pub fn new(coordinator: ChunkedUploadCoordinator, snapshots: SnapshotWriter) -> Self {
        Self { coordinator, snapshots }
    }

    pub fn coordinator(&self) -> &ChunkedUploadCoordinator {
        &self.coordinator
    }

    pub async fn init(&self, course_id: &str, total_chunks: u32, operation: Operation) -> CourseResult<Value> {
        let session = self
            .coordinator
            .init(course_id, total_chunks, operation)
            .await
            .map_err(CourseError::from)?;

        Ok(json!({
            "success": true,
            "uploadId": session.upload_id.as_str(),
            "courseId": session.course_id,
            "totalChunks": session.total_chunks,
            "operation": session.operation.as_str(),
            "expiresInSecs": self.coordinator.rules().session_ttl.as_secs(),
        }))
    }

    pub async fn chunk(&self, upload_id: &str, chunk_index: u32, bytes: Bytes) -> CourseResult<Value> {
        let receipt = self
            .coordinator
            .accept_chunk(&UploadId::from_string(upload_id.to_string()), chunk_index, bytes)
            .await
            .map_err(CourseError::from)?;

        Ok(json!({
            "success": true,
            "uploadId": upload_id,
            "chunkIndex": receipt.chunk_index,
            "received": receipt.received,
            "totalChunks": receipt.total_chunks,
        }))
    }

    pub async fn complete(&self, upload_id: &str, expected_version: Option<u64>) -> CourseResult<Value> {
        let upload = self
            .coordinator
            .complete(&UploadId::from_string(upload_id.to_string()))
            .await
            .map_err(CourseError::from)?;

        let slot = match upload.operation {
            Operation::Checkpoint => PointerSlot::Draft,
            Operation::Publish => PointerSlot::Published,
        };
        let outcome = self
            .snapshots
            .write(slot, &upload.course_id, upload.course, expected_version)
            .await?;

        let mut body = outcome.to_json();
        body["uploadId"] = json!(upload.upload_id.as_str());
        body["operation"] = json!(upload.operation.as_str());
        body["compressedBytes"] = json!(upload.compressed_bytes);
        body["payloadBytes"] = json!(upload.payload_bytes);
        Ok(body)
    }
}
