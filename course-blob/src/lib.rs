//! # course-blob: snapshot blobs, media objects and chunked uploads
//!
//! `course-blob` owns every byte the pipeline stores outside the system of
//! record:
//!
//! - **Codec**: course ⇄ deterministic JSON blob, sha-256 content hash, stats
//! - **Blob stores**: write-once snapshot storage (Telegram, in-memory)
//! - **Object stores**: a priority chain of media backends (R2, Google Drive,
//!   in-memory) used to move inline images out of course content
//! - **Chunked uploads**: session store, reassembly and eviction
//!
//! ```text
//! ┌──────────────────────────┐
//! │ Snapshot writers         │  ← course-server
//! ├──────────────────────────┤
//! │ BlobAdapter / Coordinator│  ← size guards, hashing, reassembly
//! ├──────────────────────────┤
//! │ BlobStore / SessionStore │  ← storage primitives
//! └──────────────────────────┘
//! ```

pub mod adapter;
pub mod codec;
mod config;
mod coordinator;
mod error;
mod memory;
pub mod object;
mod reaper;
mod receipt;
mod session_store;
pub mod store;
mod telegram;
mod types;
mod upload;

pub use adapter::BlobAdapter;
pub use codec::EncodedBlob;
pub use config::{BlobConfig, UploadRules};
pub use coordinator::{ChunkReceipt, ChunkedUploadCoordinator, ReassembledUpload};
pub use error::{BlobError, BlobResult};
pub use memory::MemoryBlobStore;
pub use object::{
    DataUri, DefaultMediaKeys, GoogleDriveObjectStore, MediaKeyStrategy, MemoryObjectStore, ObjectStore,
    ObjectStoreChain, R2ObjectStore, StoredObject,
};
pub use reaper::SessionReaper;
pub use receipt::BlobReceipt;
pub use session_store::MemoryUploadSessionStore;
pub use store::{BlobStore, PutResult, StoreCapabilities};
pub use telegram::{TelegramBlobStore, TelegramConfig};
pub use types::{BlobHandle, BlobStats, Operation, UploadId};
pub use upload::{UploadSession, UploadSessionStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobAdapter, BlobConfig, BlobError, BlobHandle, BlobReceipt, BlobResult, BlobStore,
        ChunkedUploadCoordinator, ObjectStoreChain, Operation, UploadId,
    };
}
