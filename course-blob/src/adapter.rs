use std::sync::Arc;

use bytes::Bytes;
use course_core::Course;
use tracing::debug;

use crate::codec::{self, EncodedBlob};
use crate::{BlobConfig, BlobError, BlobHandle, BlobReceipt, BlobResult, BlobStore};

/// The blob adapter embedded by the snapshot writers and the migration sweep.
///
/// Stateless apart from its store and config; safe to share behind an `Arc`.
#[derive(Clone)]
pub struct BlobAdapter {
    store: Arc<dyn BlobStore>,
    config: BlobConfig,
}

impl BlobAdapter {
    pub fn new<S: BlobStore + 'static>(store: S, config: BlobConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
        }
    }

    pub fn from_arc(store: Arc<dyn BlobStore>, config: BlobConfig) -> Self {
        Self { store, config }
    }

    /// Upload an encoded snapshot.
    ///
    /// This is the durability anchor of every write: once it returns, the
    /// snapshot exists regardless of what happens to the pointer.
    pub async fn put(&self, course_id: &str, encoded: &EncodedBlob) -> BlobResult<BlobReceipt> {
        let size = encoded.bytes.len() as u64;
        // A blob the store cannot serve back is as good as lost.
        let caps = self.store.capabilities();
        let limit = [caps.max_upload_bytes, caps.max_download_bytes]
            .into_iter()
            .flatten()
            .fold(self.config.max_blob_bytes, u64::min);
        if size > limit {
            return Err(BlobError::TooLarge { size, max: limit });
        }

        let file_name = blob_file_name(course_id, &encoded.hash);
        let result = self
            .store
            .upload(&file_name, encoded.bytes.clone())
            .await
            .map_err(|e| match e {
                BlobError::TooLarge { .. } | BlobError::UploadFailed { .. } => e,
                other => BlobError::upload_failed(other.to_string()),
            })?;

        debug!(
            course_id,
            handle = %result.handle,
            size_bytes = result.size_bytes,
            store = self.store.name(),
            "Snapshot blob uploaded"
        );

        Ok(BlobReceipt::new(result.handle, encoded.hash.clone(), encoded.stats).with_store(self.store.name()))
    }

    /// Encode and upload in one step.
    pub async fn put_course(&self, course: &Course) -> BlobResult<(EncodedBlob, BlobReceipt)> {
        let encoded = codec::encode(course)?;
        let receipt = self.put(&course.id, &encoded).await?;
        Ok((encoded, receipt))
    }

    pub async fn fetch(&self, handle: &BlobHandle) -> BlobResult<Bytes> {
        self.store.download(handle).await
    }

    pub async fn fetch_course(&self, handle: &BlobHandle) -> BlobResult<Course> {
        let bytes = self.fetch(handle).await?;
        codec::decode(&bytes)
    }

    /// Fetch a blob and check it against the hash recorded on its pointer.
    pub async fn fetch_verified(&self, handle: &BlobHandle, expected_hash: &str) -> BlobResult<(Bytes, Course)> {
        let bytes = self.fetch(handle).await?;
        let actual = codec::content_hash(&bytes);
        if actual != expected_hash {
            return Err(BlobError::corrupt(format!(
                "Blob {handle} hash mismatch: expected {expected_hash}, got {actual}"
            )));
        }
        let course = codec::decode(&bytes)?;
        Ok((bytes, course))
    }

    pub fn config(&self) -> &BlobConfig {
        &self.config
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }
}

fn blob_file_name(course_id: &str, hash: &str) -> String {
    let short = hash.get(..12).unwrap_or(hash);
    format!("course-{course_id}-{short}.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryBlobStore, StoreCapabilities};

    fn course() -> Course {
        let mut course = Course::new("c1", "Rust 101");
        course.lessons.insert("l1".into(), Default::default());
        course.bind_id("c1")
    }

    #[tokio::test]
    async fn put_then_fetch_verified() {
        let adapter = BlobAdapter::new(MemoryBlobStore::new(), BlobConfig::default());
        let (encoded, receipt) = adapter.put_course(&course()).await.unwrap();
        assert_eq!(receipt.hash, encoded.hash);
        assert_eq!(receipt.store, "memory");

        let (bytes, decoded) = adapter.fetch_verified(&receipt.handle, &receipt.hash).await.unwrap();
        assert_eq!(bytes, encoded.bytes);
        assert_eq!(decoded.lesson_count(), 1);
    }

    #[tokio::test]
    async fn hash_mismatch_is_corrupt() {
        let adapter = BlobAdapter::new(MemoryBlobStore::new(), BlobConfig::default());
        let (_, receipt) = adapter.put_course(&course()).await.unwrap();
        let err = adapter.fetch_verified(&receipt.handle, "deadbeef").await.unwrap_err();
        assert!(matches!(err, BlobError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn oversize_blob_is_rejected_before_upload() {
        let store = MemoryBlobStore::new();
        let adapter = BlobAdapter::new(store.clone(), BlobConfig::default().with_max_blob_bytes(8));
        let err = adapter.put_course(&course()).await.unwrap_err();
        assert!(matches!(err, BlobError::TooLarge { max: 8, .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn download_cap_bounds_uploads() {
        let caps = StoreCapabilities::basic().with_upload_limit(1_000_000).with_download_limit(16);
        let store = MemoryBlobStore::new().with_capabilities(caps);
        let adapter = BlobAdapter::new(store.clone(), BlobConfig::default());
        let err = adapter.put_course(&course()).await.unwrap_err();
        assert!(matches!(err, BlobError::TooLarge { max: 16, .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn store_failures_become_upload_errors() {
        let store = MemoryBlobStore::new();
        store.fail_uploads(true);
        let adapter = BlobAdapter::new(store, BlobConfig::default());
        let err = adapter.put_course(&course()).await.unwrap_err();
        assert!(matches!(err, BlobError::UploadFailed { .. }));
    }

    #[tokio::test]
    async fn unknown_handle_is_not_found() {
        let adapter = BlobAdapter::new(MemoryBlobStore::new(), BlobConfig::default());
        let err = adapter.fetch(&BlobHandle::new("nope")).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
