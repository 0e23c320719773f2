use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use course_core::Course;
use flate2::read::GzDecoder;
use tracing::{debug, info};

use crate::{BlobError, BlobResult, Operation, UploadId, UploadRules, UploadSession, UploadSessionStore};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A completed upload, decoded and ready for its writer.
#[derive(Debug, Clone)]
pub struct ReassembledUpload {
    pub upload_id: UploadId,
    pub course_id: String,
    pub operation: Operation,
    pub course: Course,
    pub compressed_bytes: u64,
    pub payload_bytes: u64,
}

/// Progress reported after each accepted chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkReceipt {
    pub chunk_index: u32,
    pub received: u32,
    pub total_chunks: u32,
}

/// Reassembles course payloads sent as ordered, gzip-compressed chunks.
#[derive(Clone)]
pub struct ChunkedUploadCoordinator {
    sessions: Arc<dyn UploadSessionStore>,
    rules: UploadRules,
}

impl ChunkedUploadCoordinator {
    pub fn new<S: UploadSessionStore + 'static>(sessions: S, rules: UploadRules) -> Self {
        Self {
            sessions: Arc::new(sessions),
            rules,
        }
    }

    pub fn from_arc(sessions: Arc<dyn UploadSessionStore>, rules: UploadRules) -> Self {
        Self { sessions, rules }
    }

    pub fn sessions(&self) -> Arc<dyn UploadSessionStore> {
        self.sessions.clone()
    }

    pub fn rules(&self) -> &UploadRules {
        &self.rules
    }

    pub async fn init(&self, course_id: &str, total_chunks: u32, operation: Operation) -> BlobResult<UploadSession> {
        if course_id.trim().is_empty() {
            return Err(BlobError::invalid("courseId is required"));
        }
        if total_chunks == 0 || total_chunks > self.rules.max_chunks {
            return Err(BlobError::invalid(format!(
                "Invalid totalChunks: {} (must be 1-{})",
                total_chunks, self.rules.max_chunks
            )));
        }

        let session = UploadSession::new(course_id, operation, total_chunks);
        self.sessions.create(session.clone()).await?;
        debug!(upload_id = %session.upload_id, course_id, total_chunks, %operation, "Upload session started");
        Ok(session)
    }

    pub async fn accept_chunk(&self, upload_id: &UploadId, chunk_index: u32, bytes: Bytes) -> BlobResult<ChunkReceipt> {
        let session = self.sessions.get(upload_id).await?;
        if chunk_index >= session.total_chunks {
            return Err(BlobError::not_found(format!(
                "chunk {} of upload {} (expected 0-{})",
                chunk_index,
                upload_id,
                session.total_chunks - 1
            )));
        }
        let size = bytes.len() as u64;
        if size > self.rules.max_chunk_bytes {
            return Err(BlobError::TooLarge {
                size,
                max: self.rules.max_chunk_bytes,
            });
        }

        let received = self.sessions.put_chunk(upload_id, chunk_index, bytes).await?;
        Ok(ChunkReceipt {
            chunk_index,
            received,
            total_chunks: session.total_chunks,
        })
    }

    /// Verify, reassemble and decode an upload.
    ///
    /// Count and gap checks leave the session in place so the client can
    /// resend the missing chunks. Once those pass the session is consumed,
    /// whether or not the payload decodes.
    pub async fn complete(&self, upload_id: &UploadId) -> BlobResult<ReassembledUpload> {
        let session = self.sessions.get(upload_id).await?;
        if session.received() != session.total_chunks {
            return Err(BlobError::Incomplete {
                expected: session.total_chunks,
                received: session.received(),
            });
        }
        if let Some(index) = session.first_missing() {
            return Err(BlobError::MissingChunk { index });
        }

        let session = self.sessions.take(upload_id).await?;
        let compressed = session.assemble();
        let payload = self.decompress(&compressed)?;
        let course: Course = serde_json::from_slice(&payload)
            .map_err(|e| BlobError::corrupt(format!("Invalid course JSON: {e}")))?;

        info!(
            upload_id = %upload_id,
            course_id = %session.course_id,
            operation = %session.operation,
            compressed_bytes = compressed.len(),
            payload_bytes = payload.len(),
            "Chunked upload reassembled"
        );

        Ok(ReassembledUpload {
            upload_id: session.upload_id,
            course: course.bind_id(&session.course_id),
            course_id: session.course_id,
            operation: session.operation,
            compressed_bytes: compressed.len() as u64,
            payload_bytes: payload.len() as u64,
        })
    }

    /// Drop a session without completing it.
    pub async fn abort(&self, upload_id: &UploadId) -> BlobResult<bool> {
        self.sessions.delete(upload_id).await
    }

    /// Evict sessions older than the configured TTL.
    pub async fn sweep_expired(&self) -> BlobResult<usize> {
        let ttl = chrono::Duration::from_std(self.rules.session_ttl)
            .map_err(|e| BlobError::invalid(format!("session ttl out of range: {e}")))?;
        let cutoff = Utc::now() - ttl;

        let mut evicted = 0;
        for upload_id in self.sessions.list_expired(cutoff).await? {
            if self.sessions.delete(&upload_id).await? {
                debug!(upload_id = %upload_id, "Evicted expired upload session");
                evicted += 1;
            }
        }
        Ok(evicted)
    }

    /// Gunzip a payload. Payloads without the gzip magic pass through as-is.
    fn decompress(&self, bytes: &[u8]) -> BlobResult<Vec<u8>> {
        if !bytes.starts_with(&GZIP_MAGIC) {
            return Ok(bytes.to_vec());
        }

        let limit = self.rules.max_payload_bytes;
        let mut payload = Vec::new();
        GzDecoder::new(bytes)
            .take(limit + 1)
            .read_to_end(&mut payload)
            .map_err(|e| BlobError::corrupt(format!("Invalid gzip stream: {e}")))?;
        if payload.len() as u64 > limit {
            return Err(BlobError::TooLarge {
                size: payload.len() as u64,
                max: limit,
            });
        }
        Ok(payload)
    }
}
