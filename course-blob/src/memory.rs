use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::{BlobError, BlobHandle, BlobResult, BlobStore, PutResult, StoreCapabilities};

/// In-memory blob store for tests and local development
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<BlobHandle, Bytes>>>,
    fail_uploads: Arc<AtomicBool>,
    capabilities: StoreCapabilities,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise size limits like a remote store would.
    pub fn with_capabilities(mut self, capabilities: StoreCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Make uploads fail until switched back off.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Drop a blob, as if the remote store purged it.
    pub fn purge(&self, handle: &BlobHandle) -> bool {
        self.blobs.write().remove(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, _file_name: &str, bytes: Bytes) -> BlobResult<PutResult> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(BlobError::upload_failed("memory store is failing uploads"));
        }
        let handle = BlobHandle(format!("mem_{}", Uuid::new_v4().simple()));
        let size_bytes = bytes.len() as u64;
        self.blobs.write().insert(handle.clone(), bytes);
        Ok(PutResult { handle, size_bytes })
    }

    async fn download(&self, handle: &BlobHandle) -> BlobResult<Bytes> {
        self.blobs
            .read()
            .get(handle)
            .cloned()
            .ok_or_else(|| BlobError::not_found(handle.as_str()))
    }

    fn capabilities(&self) -> StoreCapabilities {
        self.capabilities.clone()
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
