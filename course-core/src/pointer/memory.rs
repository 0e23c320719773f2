use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{PointerRecord, PointerResult, PointerSlot, PointerStore, PointerStoreError, PointerWrite};

/// In-memory pointer store for tests and local development.
///
/// Failure and latency can be injected to simulate a degraded or
/// over-quota system of record.
#[derive(Clone, Default)]
pub struct MemoryPointerStore {
    records: Arc<RwLock<HashMap<String, PointerRecord>>>,
    failure: Arc<RwLock<Option<PointerStoreError>>>,
    latency: Arc<RwLock<Option<Duration>>>,
}

impl MemoryPointerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `err` (or succeed again with `None`).
    pub fn fail_with(&self, err: Option<PointerStoreError>) {
        *self.failure.write() = err;
    }

    /// Delay every subsequent call.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Read a record without going through the failure injection.
    pub fn peek(&self, course_id: &str) -> Option<PointerRecord> {
        self.records.read().get(course_id).cloned()
    }

    /// Seed a record directly.
    pub fn insert(&self, record: PointerRecord) {
        self.records.write().insert(record.course_id.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    async fn gate(&self) -> PointerResult<()> {
        let latency = *self.latency.read();
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        let failure = self.failure.read().clone();
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PointerStore for MemoryPointerStore {
    async fn load(&self, course_id: &str) -> PointerResult<Option<PointerRecord>> {
        self.gate().await?;
        Ok(self.records.read().get(course_id).cloned())
    }

    async fn write(&self, course_id: &str, write: &PointerWrite) -> PointerResult<PointerRecord> {
        self.gate().await?;
        let mut records = self.records.write();
        let mut record = records
            .get(course_id)
            .cloned()
            .unwrap_or_else(|| PointerRecord::new(course_id));
        record.apply(write)?;
        records.insert(course_id.to_string(), record.clone());
        Ok(record)
    }

    async fn backfill(
        &self,
        course_id: &str,
        slot: PointerSlot,
        from_handle: &str,
        blob_handle: &str,
        hash: &str,
    ) -> PointerResult<bool> {
        self.gate().await?;
        let mut records = self.records.write();
        let record = records
            .get_mut(course_id)
            .ok_or_else(|| PointerStoreError::NotFound(course_id.to_string()))?;
        record.backfill(slot, from_handle, blob_handle, hash)
    }

    async fn list(&self) -> PointerResult<Vec<PointerRecord>> {
        self.gate().await?;
        let mut records: Vec<PointerRecord> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| a.course_id.cmp(&b.course_id));
        Ok(records)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
