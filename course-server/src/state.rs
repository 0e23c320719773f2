use std::sync::Arc;

use anyhow::{bail, Result};
use course_axum::BearerGuard;
use course_blob::{
    BlobAdapter, BlobConfig, BlobStore, ChunkedUploadCoordinator, GoogleDriveObjectStore, MemoryBlobStore,
    MemoryObjectStore, MemoryUploadSessionStore, ObjectStoreChain, R2ObjectStore, TelegramBlobStore,
    UploadSessionStore,
};
use course_core::{CourseConfigSnapshot, CourseError, MemoryPointerStore, PointerStore};
use course_queue::{FileRegistry, MemoryRegistry, RegistryBackend, SyncSweeper};
use tracing::{info, warn};

use crate::config::PipelineSettings;
use crate::services::adapters::FirestorePointerStore;
use crate::services::{MigrationService, SnapshotWriter, SyncService, UploadService};

/// The storage backends the pipeline runs on.
#[derive(Clone)]
pub struct PipelineParts {
    pub blob_store: Arc<dyn BlobStore>,
    pub pointers: Arc<dyn PointerStore>,
    pub registry: Arc<dyn RegistryBackend>,
    pub sessions: Arc<dyn UploadSessionStore>,
    pub objects: ObjectStoreChain,
}

impl PipelineParts {
    /// Everything in process memory.
    pub fn in_memory() -> Self {
        Self {
            blob_store: Arc::new(MemoryBlobStore::new()),
            pointers: Arc::new(MemoryPointerStore::new()),
            registry: Arc::new(MemoryRegistry::new()),
            sessions: Arc::new(MemoryUploadSessionStore::new()),
            objects: ObjectStoreChain::new().with(MemoryObjectStore::new()),
        }
    }

    /// Backends named by `storage.backend`, `pointer.backend`,
    /// `registry.backend` and `media.backends`.
    pub async fn from_config(config: &CourseConfigSnapshot) -> Result<Self> {
        let blob_store: Arc<dyn BlobStore> = match config.get("storage.backend").unwrap_or("memory") {
            "memory" => Arc::new(MemoryBlobStore::new()),
            "telegram" => Arc::new(TelegramBlobStore::from_env().map_err(CourseError::from)?),
            other => bail!(CourseError::validation(format!("Unknown storage.backend: {other}"))),
        };

        let pointers: Arc<dyn PointerStore> = match config.get("pointer.backend").unwrap_or("memory") {
            "memory" => Arc::new(MemoryPointerStore::new()),
            "firestore" => Arc::new(FirestorePointerStore::from_env().map_err(CourseError::from)?),
            other => bail!(CourseError::validation(format!("Unknown pointer.backend: {other}"))),
        };

        let registry: Arc<dyn RegistryBackend> = match config.get("registry.backend").unwrap_or("memory") {
            "memory" => Arc::new(MemoryRegistry::new()),
            "file" => {
                let path = config.get("registry.path").unwrap_or("data/course-registry.json");
                Arc::new(FileRegistry::open(path).await.map_err(CourseError::from)?)
            }
            other => bail!(CourseError::validation(format!("Unknown registry.backend: {other}"))),
        };

        let mut objects = ObjectStoreChain::new();
        for name in config
            .get("media.backends")
            .unwrap_or("memory")
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            match name {
                "memory" => objects.push(Arc::new(MemoryObjectStore::new())),
                "r2" => objects.push(Arc::new(R2ObjectStore::from_env().await.map_err(CourseError::from)?)),
                "drive" => objects.push(Arc::new(GoogleDriveObjectStore::from_env().map_err(CourseError::from)?)),
                other => bail!(CourseError::validation(format!("Unknown media backend: {other}"))),
            }
        }

        info!(
            blob_store = blob_store.name(),
            pointers = pointers.name(),
            registry = registry.name(),
            media = ?objects.names(),
            "Pipeline backends ready"
        );

        Ok(Self {
            blob_store,
            pointers,
            registry,
            sessions: Arc::new(MemoryUploadSessionStore::new()),
            objects,
        })
    }
}

/// Services shared by every route handler.
#[derive(Clone)]
pub struct PipelineState {
    pub settings: Arc<PipelineSettings>,
    pub snapshots: SnapshotWriter,
    pub uploads: UploadService,
    pub sync: SyncService,
    pub migration: MigrationService,
    pub admin_guard: BearerGuard,
    pub cron_guard: BearerGuard,
}

impl PipelineState {
    pub fn new(settings: PipelineSettings, parts: PipelineParts) -> Self {
        let blob_config = BlobConfig::new()
            .with_max_blob_bytes(settings.max_blob_bytes)
            .with_upload_rules(settings.upload_rules.clone());
        let blobs = BlobAdapter::from_arc(parts.blob_store, blob_config);

        let snapshots = SnapshotWriter::new(
            blobs.clone(),
            Arc::clone(&parts.pointers),
            Arc::clone(&parts.registry),
            settings.write_policy,
        )
        .with_timeouts(settings.checkpoint_timeout, settings.publish_timeout);

        let coordinator = ChunkedUploadCoordinator::from_arc(parts.sessions, settings.upload_rules.clone());
        let uploads = UploadService::new(coordinator, snapshots.clone());

        let sweeper = SyncSweeper::new(Arc::clone(&parts.registry), Arc::clone(&parts.pointers))
            .with_write_timeout(settings.publish_timeout);
        let sync = SyncService::new(sweeper);

        let migration = MigrationService::new(blobs, parts.pointers, parts.registry, parts.objects)
            .with_budget(settings.migration_budget);

        if settings.admin_token.is_none() {
            warn!("auth.admin_token is not set; admin routes are open");
        }

        Self {
            admin_guard: BearerGuard::new(settings.admin_token.clone()),
            cron_guard: BearerGuard::new(settings.cron_secret.clone()),
            settings: Arc::new(settings),
            snapshots,
            uploads,
            sync,
            migration,
        }
    }
}
