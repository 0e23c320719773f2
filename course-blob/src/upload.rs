use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::{BlobResult, Operation, UploadId};

/// A chunked upload in progress.
///
/// Chunks are keyed by their zero-based index; re-sending an index
/// replaces the earlier bytes.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub upload_id: UploadId,
    pub course_id: String,
    pub operation: Operation,
    pub total_chunks: u32,
    pub chunks: BTreeMap<u32, Bytes>,
    pub created_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn new(course_id: impl Into<String>, operation: Operation, total_chunks: u32) -> Self {
        Self {
            upload_id: UploadId::new(),
            course_id: course_id.into(),
            operation,
            total_chunks,
            chunks: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn received(&self) -> u32 {
        self.chunks.len() as u32
    }

    /// The lowest index in `0..total_chunks` that has not arrived.
    pub fn first_missing(&self) -> Option<u32> {
        (0..self.total_chunks).find(|i| !self.chunks.contains_key(i))
    }

    /// Concatenate the chunks in index order.
    pub fn assemble(&self) -> Vec<u8> {
        let size = self.chunks.values().map(Bytes::len).sum();
        let mut buffer = Vec::with_capacity(size);
        for chunk in self.chunks.values() {
            buffer.extend_from_slice(chunk);
        }
        buffer
    }

    pub fn is_expired(&self, cutoff: DateTime<Utc>) -> bool {
        self.created_at < cutoff
    }
}

/// Storage for upload session state.
///
/// The in-memory implementation ties sessions to one process; a shared
/// implementation lets chunks of one upload land on different instances.
#[async_trait]
pub trait UploadSessionStore: Send + Sync {
    async fn create(&self, session: UploadSession) -> BlobResult<()>;

    /// `UploadNotFound` for unknown or evicted sessions
    async fn get(&self, upload_id: &UploadId) -> BlobResult<UploadSession>;

    /// Store a chunk and return how many distinct chunks the session holds
    async fn put_chunk(&self, upload_id: &UploadId, index: u32, bytes: Bytes) -> BlobResult<u32>;

    /// Remove and return a session. Only one caller can take a session.
    async fn take(&self, upload_id: &UploadId) -> BlobResult<UploadSession>;

    /// Returns whether the session existed
    async fn delete(&self, upload_id: &UploadId) -> BlobResult<bool>;

    /// Sessions created before `cutoff`
    async fn list_expired(&self, cutoff: DateTime<Utc>) -> BlobResult<Vec<UploadId>>;

    async fn count(&self) -> BlobResult<usize>;
}
