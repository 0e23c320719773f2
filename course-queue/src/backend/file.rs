use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::memory::RegistryState;
use crate::{backend::RegistryBackend, QueueResult, SyncEntry, SyncKey};

#[derive(Serialize, Deserialize, Default)]
struct RegistryFile {
    #[serde(default)]
    entries: Vec<SyncEntry>,
}

/// Registry persisted as a JSON file.
///
/// Every mutation rewrites the file through a temporary sibling and a
/// rename, so a crash leaves either the old or the new contents.
pub struct FileRegistry {
    path: PathBuf,
    state: Mutex<RegistryState>,
}

impl FileRegistry {
    /// Open a registry file, creating parent directories as needed.
    /// A missing file is an empty registry.
    pub async fn open(path: impl AsRef<Path>) -> QueueResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => RegistryFile::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RegistryFile::default(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), entries = file.entries.len(), "Opened course registry");
        Ok(Self {
            path,
            state: Mutex::new(RegistryState::from_entries(file.entries)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, state: &RegistryState) -> QueueResult<()> {
        let file = RegistryFile {
            entries: state.entries().to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl RegistryBackend for FileRegistry {
    async fn enqueue(&self, entry: SyncEntry) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        state.enqueue(entry);
        self.persist(&state).await
    }

    async fn pending(&self) -> QueueResult<Vec<SyncEntry>> {
        Ok(self.state.lock().await.pending())
    }

    async fn get(&self, key: &SyncKey) -> QueueResult<Option<SyncEntry>> {
        Ok(self.state.lock().await.get(key))
    }

    async fn mark_synced(&self, key: &SyncKey, blob_handle: &str) -> QueueResult<bool> {
        let mut state = self.state.lock().await;
        let marked = state.mark_synced(key, blob_handle);
        if marked {
            self.persist(&state).await?;
        }
        Ok(marked)
    }

    async fn record_failure(&self, key: &SyncKey, error: &str) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        if state.record_failure(key, error) {
            self.persist(&state).await?;
        }
        Ok(())
    }

    async fn clear(&self, key: &SyncKey, at: DateTime<Utc>) -> QueueResult<bool> {
        let mut state = self.state.lock().await;
        let removed = state.clear(key, at);
        if removed {
            self.persist(&state).await?;
        }
        Ok(removed)
    }

    async fn rewrite_handle(&self, old_handle: &str, new_handle: &str, new_hash: &str) -> QueueResult<usize> {
        let mut state = self.state.lock().await;
        let changed = state.rewrite_handle(old_handle, new_handle, new_hash);
        if changed > 0 {
            self.persist(&state).await?;
        }
        Ok(changed)
    }

    async fn compact(&self) -> QueueResult<usize> {
        let mut state = self.state.lock().await;
        let removed = state.compact();
        if removed > 0 {
            self.persist(&state).await?;
        }
        Ok(removed)
    }

    async fn pending_count(&self) -> QueueResult<usize> {
        Ok(self.state.lock().await.pending_count())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
