use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::{ObjectCapabilities, ObjectStore, StoredObject};
use crate::{BlobError, BlobResult};

/// In-memory object store. URLs look like `memory://{name}/{key}`.
#[derive(Clone)]
pub struct MemoryObjectStore {
    name: &'static str,
    capabilities: ObjectCapabilities,
    objects: Arc<RwLock<HashMap<String, (String, Bytes)>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::named("memory", 100)
    }

    pub fn named(name: &'static str, priority: u8) -> Self {
        Self {
            name,
            capabilities: ObjectCapabilities::with_priority(priority),
            objects: Arc::new(RwLock::new(HashMap::new())),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A store that rejects every write.
    pub fn failing() -> Self {
        let store = Self::new();
        store.set_failing(true);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn with_max_object_bytes(mut self, bytes: u64) -> Self {
        self.capabilities = self.capabilities.with_max_object_bytes(bytes);
        self
    }

    pub fn get(&self, key: &str) -> Option<(String, Bytes)> {
        self.objects.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, key: &str, content_type: &str, bytes: Bytes) -> BlobResult<StoredObject> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BlobError::upload_failed(format!("{} object store is failing", self.name)));
        }
        let size_bytes = bytes.len() as u64;
        self.objects
            .write()
            .insert(key.to_string(), (content_type.to_string(), bytes));
        Ok(StoredObject {
            url: format!("memory://{}/{}", self.name, key),
            key: key.to_string(),
            backend: self.name,
            size_bytes,
        })
    }

    fn capabilities(&self) -> ObjectCapabilities {
        self.capabilities.clone()
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
