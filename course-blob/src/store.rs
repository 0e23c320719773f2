use async_trait::async_trait;
use bytes::Bytes;

use crate::{BlobHandle, BlobResult};

/// Core blob storage operations - implemented by every snapshot backend.
///
/// Blobs are write-once: a store never overwrites or deletes what it
/// returned a handle for.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob under a human-readable file name
    async fn upload(&self, file_name: &str, bytes: Bytes) -> BlobResult<PutResult>;

    /// Fetch a blob by handle. Unknown or purged handles are `NotFound`.
    async fn download(&self, handle: &BlobHandle) -> BlobResult<Bytes>;

    /// Get store capabilities
    fn capabilities(&self) -> StoreCapabilities;

    fn name(&self) -> &'static str;
}

/// Result of a successful upload
#[derive(Debug, Clone)]
pub struct PutResult {
    pub handle: BlobHandle,
    pub size_bytes: u64,
}

/// Store capabilities
#[derive(Debug, Clone, Default)]
pub struct StoreCapabilities {
    pub max_upload_bytes: Option<u64>,
    pub max_download_bytes: Option<u64>,
}

impl StoreCapabilities {
    pub fn basic() -> Self {
        Self::default()
    }

    pub fn with_upload_limit(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = Some(bytes);
        self
    }

    pub fn with_download_limit(mut self, bytes: u64) -> Self {
        self.max_download_bytes = Some(bytes);
        self
    }
}
