use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{backend::RegistryBackend, QueueResult, SyncEntry, SyncKey};

/// Registry contents, shared by the memory and file backends.
#[derive(Debug, Clone, Default)]
pub(crate) struct RegistryState {
    entries: Vec<SyncEntry>,
    index: BTreeMap<SyncKey, usize>,
}

impl RegistryState {
    pub(crate) fn from_entries(entries: Vec<SyncEntry>) -> Self {
        let mut state = Self::default();
        for entry in entries {
            state.enqueue(entry);
        }
        state
    }

    pub(crate) fn entries(&self) -> &[SyncEntry] {
        &self.entries
    }

    fn find_mut(&mut self, key: &SyncKey) -> Option<&mut SyncEntry> {
        let idx = *self.index.get(key)?;
        self.entries.get_mut(idx)
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.key(), i))
            .collect();
    }

    pub(crate) fn enqueue(&mut self, entry: SyncEntry) {
        let key = entry.key();
        match self.index.get(&key) {
            Some(&idx) => self.entries[idx] = entry,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub(crate) fn pending(&self) -> Vec<SyncEntry> {
        let mut pending: Vec<SyncEntry> = self.entries.iter().filter(|e| !e.synced).cloned().collect();
        pending.sort_by_key(SyncEntry::key);
        pending
    }

    pub(crate) fn get(&self, key: &SyncKey) -> Option<SyncEntry> {
        self.index.get(key).and_then(|&i| self.entries.get(i)).cloned()
    }

    pub(crate) fn mark_synced(&mut self, key: &SyncKey, blob_handle: &str) -> bool {
        match self.find_mut(key) {
            Some(entry) if entry.blob_handle() == blob_handle && !entry.synced => {
                entry.synced = true;
                entry.synced_at = Some(Utc::now());
                entry.last_error = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn record_failure(&mut self, key: &SyncKey, error: &str) -> bool {
        match self.find_mut(key) {
            Some(entry) => {
                entry.attempts += 1;
                entry.last_error = Some(error.to_string());
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&mut self, key: &SyncKey, at: DateTime<Utc>) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.key() != *key || e.written_at > at);
        let removed = self.entries.len() != before;
        if removed {
            self.reindex();
        }
        removed
    }

    pub(crate) fn rewrite_handle(&mut self, old_handle: &str, new_handle: &str, new_hash: &str) -> usize {
        let mut changed = 0;
        for entry in self.entries.iter_mut().filter(|e| e.blob.blob_handle == old_handle) {
            entry.blob.blob_handle = new_handle.to_string();
            entry.blob.hash = new_hash.to_string();
            changed += 1;
        }
        changed
    }

    pub(crate) fn compact(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !e.synced);
        let removed = before - self.entries.len();
        if removed > 0 {
            self.reindex();
        }
        removed
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.synced).count()
    }
}

/// In-memory registry for tests and single-process development
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry, synced or not (test helper)
    pub fn all(&self) -> Vec<SyncEntry> {
        self.state.read().entries().to_vec()
    }
}

#[async_trait]
impl RegistryBackend for MemoryRegistry {
    async fn enqueue(&self, entry: SyncEntry) -> QueueResult<()> {
        self.state.write().enqueue(entry);
        Ok(())
    }

    async fn pending(&self) -> QueueResult<Vec<SyncEntry>> {
        Ok(self.state.read().pending())
    }

    async fn get(&self, key: &SyncKey) -> QueueResult<Option<SyncEntry>> {
        Ok(self.state.read().get(key))
    }

    async fn mark_synced(&self, key: &SyncKey, blob_handle: &str) -> QueueResult<bool> {
        Ok(self.state.write().mark_synced(key, blob_handle))
    }

    async fn record_failure(&self, key: &SyncKey, error: &str) -> QueueResult<()> {
        self.state.write().record_failure(key, error);
        Ok(())
    }

    async fn clear(&self, key: &SyncKey, at: DateTime<Utc>) -> QueueResult<bool> {
        Ok(self.state.write().clear(key, at))
    }

    async fn rewrite_handle(&self, old_handle: &str, new_handle: &str, new_hash: &str) -> QueueResult<usize> {
        Ok(self.state.write().rewrite_handle(old_handle, new_handle, new_hash))
    }

    async fn compact(&self) -> QueueResult<usize> {
        Ok(self.state.write().compact())
    }

    async fn pending_count(&self) -> QueueResult<usize> {
        Ok(self.state.read().pending_count())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::{CourseMeta, PointerSlot, PointerWrite, SnapshotBlob};

    fn entry(course_id: &str, handle: &str) -> SyncEntry {
        let write = PointerWrite::new(
            PointerSlot::Draft,
            SnapshotBlob {
                blob_handle: handle.to_string(),
                hash: format!("h-{handle}"),
                lesson_count: 1,
                block_count: 1,
                size_bytes: 1,
            },
            CourseMeta::default(),
            vec![],
        );
        SyncEntry::from_write(course_id, &write)
    }

    #[tokio::test]
    async fn same_key_collapses_to_latest_write() {
        let registry = MemoryRegistry::new();
        registry.enqueue(entry("c1", "f1")).await.unwrap();
        registry.enqueue(entry("c1", "f2")).await.unwrap();
        registry.enqueue(entry("c2", "f3")).await.unwrap();

        let pending = registry.pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].blob_handle(), "f2");
        assert_eq!(registry.pending_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn mark_synced_ignores_replaced_entries() {
        let registry = MemoryRegistry::new();
        let key = SyncKey::new("c1", PointerSlot::Draft);
        registry.enqueue(entry("c1", "f1")).await.unwrap();
        registry.enqueue(entry("c1", "f2")).await.unwrap();

        assert!(!registry.mark_synced(&key, "f1").await.unwrap());
        assert!(registry.mark_synced(&key, "f2").await.unwrap());
        assert_eq!(registry.pending_count().await.unwrap(), 0);
        assert_eq!(registry.compact().await.unwrap(), 1);
        assert!(registry.all().is_empty());
    }

    #[tokio::test]
    async fn failures_are_recorded_not_dropped() {
        let registry = MemoryRegistry::new();
        let key = SyncKey::new("c1", PointerSlot::Draft);
        registry.enqueue(entry("c1", "f1")).await.unwrap();
        registry.record_failure(&key, "quota").await.unwrap();
        registry.record_failure(&key, "quota").await.unwrap();

        let stored = registry.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.attempts, 2);
        assert_eq!(stored.last_error.as_deref(), Some("quota"));
        assert_eq!(registry.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rewrite_handle_patches_back_references() {
        let registry = MemoryRegistry::new();
        registry.enqueue(entry("c1", "old")).await.unwrap();
        registry.enqueue(entry("c2", "other")).await.unwrap();

        assert_eq!(registry.rewrite_handle("old", "new", "h-new").await.unwrap(), 1);
        let key = SyncKey::new("c1", PointerSlot::Draft);
        let patched = registry.get(&key).await.unwrap().unwrap();
        assert_eq!(patched.blob_handle(), "new");
        assert_eq!(patched.blob.hash, "h-new");
    }

    #[tokio::test]
    async fn clear_removes_superseded_entry() {
        let registry = MemoryRegistry::new();
        let key = SyncKey::new("c1", PointerSlot::Draft);
        registry.enqueue(entry("c1", "f1")).await.unwrap();
        registry.enqueue(entry("c2", "f2")).await.unwrap();
        assert!(registry.clear(&key, Utc::now()).await.unwrap());
        assert!(registry.get(&key).await.unwrap().is_none());
        assert!(registry
            .get(&SyncKey::new("c2", PointerSlot::Draft))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn clear_keeps_an_entry_written_after_the_landed_write() {
        let registry = MemoryRegistry::new();
        let key = SyncKey::new("c1", PointerSlot::Draft);
        let landed_at = Utc::now();
        let mut newer = entry("c1", "f2");
        newer.written_at = landed_at + chrono::Duration::seconds(1);
        registry.enqueue(newer).await.unwrap();

        assert!(!registry.clear(&key, landed_at).await.unwrap());
        let kept = registry.get(&key).await.unwrap().unwrap();
        assert_eq!(kept.blob_handle(), "f2");
        assert_eq!(registry.pending_count().await.unwrap(), 1);
    }
}
