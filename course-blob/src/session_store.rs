use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{BlobError, BlobResult, UploadId, UploadSession, UploadSessionStore};

/// Process-local upload sessions
#[derive(Clone, Default)]
pub struct MemoryUploadSessionStore {
    sessions: Arc<RwLock<HashMap<UploadId, UploadSession>>>,
}

impl MemoryUploadSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backdate a session (test helper)
    pub fn set_created_at(&self, upload_id: &UploadId, created_at: DateTime<Utc>) -> bool {
        match self.sessions.write().get_mut(upload_id) {
            Some(session) => {
                session.created_at = created_at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UploadSessionStore for MemoryUploadSessionStore {
    async fn create(&self, session: UploadSession) -> BlobResult<()> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&session.upload_id) {
            return Err(BlobError::invalid(format!(
                "Upload session already exists: {}",
                session.upload_id
            )));
        }
        sessions.insert(session.upload_id.clone(), session);
        Ok(())
    }

    async fn get(&self, upload_id: &UploadId) -> BlobResult<UploadSession> {
        self.sessions
            .read()
            .get(upload_id)
            .cloned()
            .ok_or_else(|| BlobError::upload_not_found(upload_id.as_str()))
    }

    async fn put_chunk(&self, upload_id: &UploadId, index: u32, bytes: Bytes) -> BlobResult<u32> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(upload_id)
            .ok_or_else(|| BlobError::upload_not_found(upload_id.as_str()))?;
        session.chunks.insert(index, bytes);
        Ok(session.received())
    }

    async fn take(&self, upload_id: &UploadId) -> BlobResult<UploadSession> {
        self.sessions
            .write()
            .remove(upload_id)
            .ok_or_else(|| BlobError::upload_not_found(upload_id.as_str()))
    }

    async fn delete(&self, upload_id: &UploadId) -> BlobResult<bool> {
        Ok(self.sessions.write().remove(upload_id).is_some())
    }

    async fn list_expired(&self, cutoff: DateTime<Utc>) -> BlobResult<Vec<UploadId>> {
        Ok(self
            .sessions
            .read()
            .values()
            .filter(|s| s.is_expired(cutoff))
            .map(|s| s.upload_id.clone())
            .collect())
    }

    async fn count(&self) -> BlobResult<usize> {
        Ok(self.sessions.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Operation;

    #[tokio::test]
    async fn take_is_exclusive() {
        let store = MemoryUploadSessionStore::new();
        let session = UploadSession::new("c1", Operation::Checkpoint, 1);
        let id = session.upload_id.clone();
        store.create(session).await.unwrap();

        assert!(store.take(&id).await.is_ok());
        assert!(store.take(&id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn resent_chunk_overwrites() {
        let store = MemoryUploadSessionStore::new();
        let session = UploadSession::new("c1", Operation::Checkpoint, 2);
        let id = session.upload_id.clone();
        store.create(session).await.unwrap();

        assert_eq!(store.put_chunk(&id, 0, Bytes::from_static(b"old")).await.unwrap(), 1);
        assert_eq!(store.put_chunk(&id, 0, Bytes::from_static(b"new")).await.unwrap(), 1);
        assert_eq!(store.get(&id).await.unwrap().assemble(), b"new");
    }

    #[tokio::test]
    async fn lists_sessions_older_than_cutoff() {
        let store = MemoryUploadSessionStore::new();
        let old = UploadSession::new("c1", Operation::Publish, 1);
        let fresh = UploadSession::new("c2", Operation::Publish, 1);
        let old_id = old.upload_id.clone();
        store.create(old).await.unwrap();
        store.create(fresh).await.unwrap();
        store.set_created_at(&old_id, Utc::now() - chrono::Duration::minutes(10));

        let expired = store
            .list_expired(Utc::now() - chrono::Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(expired, vec![old_id]);
    }
}
