//! Object storage for media extracted from course content.
//!
//! Backends are tried in priority order through an [`ObjectStoreChain`];
//! the first one that accepts an object wins and its public URL replaces
//! the inline data in the course.

mod data_uri;
mod drive;
mod memory;
mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::warn;

use crate::{BlobError, BlobResult};

pub use data_uri::DataUri;
pub use drive::{DriveConfig, GoogleDriveObjectStore};
pub use memory::MemoryObjectStore;
pub use s3::{R2Config, R2ObjectStore};

/// An object as written by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub url: String,
    pub key: String,
    pub backend: &'static str,
    pub size_bytes: u64,
}

/// What a backend can do and where it sits in the chain
#[derive(Debug, Clone, Default)]
pub struct ObjectCapabilities {
    /// Lower runs first
    pub priority: u8,
    pub max_object_bytes: Option<u64>,
}

impl ObjectCapabilities {
    pub fn with_priority(priority: u8) -> Self {
        Self {
            priority,
            max_object_bytes: None,
        }
    }

    pub fn with_max_object_bytes(mut self, bytes: u64) -> Self {
        self.max_object_bytes = Some(bytes);
        self
    }

    fn accepts(&self, size: u64) -> bool {
        self.max_object_bytes.map_or(true, |max| size <= max)
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object and return its public URL
    async fn put_object(&self, key: &str, content_type: &str, bytes: Bytes) -> BlobResult<StoredObject>;

    fn capabilities(&self) -> ObjectCapabilities;

    fn name(&self) -> &'static str;
}

/// Ordered list of object backends.
#[derive(Clone, Default)]
pub struct ObjectStoreChain {
    backends: Vec<Arc<dyn ObjectStore>>,
}

impl ObjectStoreChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend; the chain stays sorted by priority.
    pub fn with<S: ObjectStore + 'static>(mut self, store: S) -> Self {
        self.push(Arc::new(store));
        self
    }

    pub fn push(&mut self, store: Arc<dyn ObjectStore>) {
        self.backends.push(store);
        self.backends.sort_by_key(|b| b.capabilities().priority);
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Try each backend in turn until one stores the object.
    pub async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> BlobResult<StoredObject> {
        if self.backends.is_empty() {
            return Err(BlobError::upload_failed("no object store configured"));
        }

        let size = bytes.len() as u64;
        let mut failures = Vec::new();
        for backend in &self.backends {
            if !backend.capabilities().accepts(size) {
                failures.push(format!("{}: object too large ({size} bytes)", backend.name()));
                continue;
            }
            match backend.put_object(key, content_type, bytes.clone()).await {
                Ok(stored) => return Ok(stored),
                Err(e) => {
                    warn!(backend = backend.name(), key, error = %e, "Object store failed, trying next backend");
                    failures.push(format!("{}: {}", backend.name(), e));
                }
            }
        }

        Err(BlobError::upload_failed(failures.join("; ")))
    }
}

/// Strategy for naming extracted media objects
pub trait MediaKeyStrategy: Send + Sync {
    fn object_key(&self, course_id: &str, digest: &str, extension: &str) -> String;
}

/// Default strategy: `courses/{course_id}/media/{digest}.{ext}`
///
/// Keys are content addressed, so re-running a migration rewrites the same
/// object instead of creating a new one.
#[derive(Debug, Clone, Default)]
pub struct DefaultMediaKeys;

impl MediaKeyStrategy for DefaultMediaKeys {
    fn object_key(&self, course_id: &str, digest: &str, extension: &str) -> String {
        let short = digest.get(..24).unwrap_or(digest);
        format!("courses/{}/media/{}.{}", course_id, short, extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_healthy_backend_wins() {
        let chain = ObjectStoreChain::new()
            .with(MemoryObjectStore::named("secondary", 2))
            .with(MemoryObjectStore::named("primary", 1));
        assert_eq!(chain.names(), vec!["primary", "secondary"]);

        let stored = chain.put("k.png", "image/png", Bytes::from_static(b"png")).await.unwrap();
        assert_eq!(stored.backend, "primary");
    }

    #[tokio::test]
    async fn falls_back_when_primary_fails() {
        let primary = MemoryObjectStore::named("primary", 1);
        primary.set_failing(true);
        let secondary = MemoryObjectStore::named("secondary", 2);
        let chain = ObjectStoreChain::new().with(primary).with(secondary.clone());

        let stored = chain.put("k.png", "image/png", Bytes::from_static(b"png")).await.unwrap();
        assert_eq!(stored.backend, "secondary");
        assert_eq!(secondary.len(), 1);
    }

    #[tokio::test]
    async fn all_failures_are_reported() {
        let chain = ObjectStoreChain::new().with(MemoryObjectStore::failing());
        let err = chain.put("k", "image/png", Bytes::from_static(b"x")).await.unwrap_err();
        assert!(err.to_string().contains("memory"));

        let empty = ObjectStoreChain::new();
        assert!(empty.put("k", "image/png", Bytes::new()).await.is_err());
    }

    #[tokio::test]
    async fn size_limits_skip_a_backend() {
        let small = MemoryObjectStore::named("small", 1).with_max_object_bytes(2);
        let big = MemoryObjectStore::named("big", 2);
        let chain = ObjectStoreChain::new().with(small.clone()).with(big);

        let stored = chain.put("k", "image/png", Bytes::from_static(b"xyz")).await.unwrap();
        assert_eq!(stored.backend, "big");
        assert!(small.is_empty());
    }

    #[test]
    fn media_keys_are_content_addressed() {
        let key = DefaultMediaKeys.object_key("c1", "abcdef0123456789abcdef0123456789", "png");
        assert_eq!(key, "courses/c1/media/abcdef0123456789abcdef01.png");
    }
}
