use chrono::{DateTime, Utc};
use course_core::SnapshotBlob;
use serde::{Deserialize, Serialize};

use crate::{BlobHandle, BlobStats};

/// Receipt returned after successfully storing a snapshot blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobReceipt {
    pub handle: BlobHandle,
    pub hash: String,
    pub stats: BlobStats,
    pub store: String,
    pub created_at: DateTime<Utc>,
}

impl BlobReceipt {
    pub fn new(handle: BlobHandle, hash: String, stats: BlobStats) -> Self {
        Self {
            handle,
            hash,
            stats,
            store: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_store<S: Into<String>>(mut self, store: S) -> Self {
        self.store = store.into();
        self
    }

    /// The blob as it will be bound to a pointer.
    pub fn to_snapshot_blob(&self) -> SnapshotBlob {
        SnapshotBlob {
            blob_handle: self.handle.0.clone(),
            hash: self.hash.clone(),
            lesson_count: self.stats.lesson_count,
            block_count: self.stats.block_count,
            size_bytes: self.stats.size_bytes,
        }
    }
}
