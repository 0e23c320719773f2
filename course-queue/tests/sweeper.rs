use std::sync::Arc;
use std::time::Duration;

use course_core::{
    CourseMeta, MemoryPointerStore, PointerSlot, PointerStore, PointerStoreError, PointerWrite, SnapshotBlob,
};
use course_queue::{MemoryRegistry, RegistryBackend, SyncEntry, SyncKey, SyncSweeper};

fn write(slot: PointerSlot, handle: &str) -> PointerWrite {
    PointerWrite::new(
        slot,
        SnapshotBlob {
            blob_handle: handle.to_string(),
            hash: format!("hash-{handle}"),
            lesson_count: 2,
            block_count: 5,
            size_bytes: 64,
        },
        CourseMeta {
            title: "Course".into(),
            ..CourseMeta::default()
        },
        vec![],
    )
}

fn setup() -> (SyncSweeper, MemoryRegistry, MemoryPointerStore) {
    let registry = MemoryRegistry::new();
    let pointers = MemoryPointerStore::new();
    let sweeper = SyncSweeper::new(Arc::new(registry.clone()), Arc::new(pointers.clone()))
        .with_write_timeout(Duration::from_millis(200));
    (sweeper, registry, pointers)
}

#[tokio::test]
async fn successful_sweep_removes_entry_and_bumps_version() {
    let (sweeper, registry, pointers) = setup();
    registry
        .enqueue(SyncEntry::from_write("c1", &write(PointerSlot::Draft, "f1")))
        .await
        .unwrap();

    let summary = sweeper.sync_pending_courses().await.unwrap();
    assert_eq!(summary.synced, 1);
    assert_eq!(summary.remaining, 0);
    assert!(!summary.quota_exhausted);
    assert!(registry.all().is_empty());

    let record = pointers.peek("c1").unwrap();
    assert_eq!(record.version(PointerSlot::Draft), 1);
    assert_eq!(record.blob_handle(PointerSlot::Draft), Some("f1"));
    assert_eq!(record.meta.title, "Course");
}

#[tokio::test]
async fn quota_exhaustion_keeps_entries_and_reports_it() {
    let (sweeper, registry, pointers) = setup();
    registry
        .enqueue(SyncEntry::from_write("c1", &write(PointerSlot::Draft, "f1")))
        .await
        .unwrap();
    registry
        .enqueue(SyncEntry::from_write("c2", &write(PointerSlot::Draft, "f2")))
        .await
        .unwrap();
    pointers.fail_with(Some(PointerStoreError::QuotaExhausted("daily writes".into())));

    let summary = sweeper.sync_pending_courses().await.unwrap();
    assert!(summary.quota_exhausted);
    assert_eq!(summary.attempted, 1, "sweep stops at the first quota error");
    assert_eq!(summary.remaining, 2);
    assert_eq!(sweeper.pending_sync_count().await.unwrap(), 2);

    let entry = registry
        .get(&SyncKey::new("c1", PointerSlot::Draft))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.attempts, 1);

    pointers.fail_with(None);
    let summary = sweeper.sync_pending_courses().await.unwrap();
    assert_eq!(summary.synced, 2);
    assert_eq!(summary.remaining, 0);
}

#[tokio::test]
async fn other_failures_do_not_stop_the_sweep() {
    let (sweeper, registry, pointers) = setup();
    registry
        .enqueue(SyncEntry::from_write("c1", &write(PointerSlot::Draft, "f1")))
        .await
        .unwrap();
    registry
        .enqueue(SyncEntry::from_write("c2", &write(PointerSlot::Published, "f2")))
        .await
        .unwrap();
    pointers.set_latency(Some(Duration::from_secs(1)));

    let summary = sweeper.sync_pending_courses().await.unwrap();
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.failed, 2);
    assert!(!summary.quota_exhausted);
    assert_eq!(summary.remaining, 2);
}

#[tokio::test]
async fn late_landing_write_is_not_applied_twice() {
    let (sweeper, registry, pointers) = setup();
    let w = write(PointerSlot::Draft, "f1");
    // The original write reached the store after the writer gave up on it.
    pointers.write("c1", &w).await.unwrap();
    registry.enqueue(SyncEntry::from_write("c1", &w)).await.unwrap();

    let summary = sweeper.sync_pending_courses().await.unwrap();
    assert_eq!(summary.synced, 1);
    assert_eq!(pointers.peek("c1").unwrap().version(PointerSlot::Draft), 1);
}

#[tokio::test]
async fn newer_pointer_supersedes_pending_write() {
    let (sweeper, registry, pointers) = setup();
    let stale = write(PointerSlot::Draft, "old");
    registry.enqueue(SyncEntry::from_write("c1", &stale)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    pointers.write("c1", &write(PointerSlot::Draft, "new")).await.unwrap();

    sweeper.sync_pending_courses().await.unwrap();
    let record = pointers.peek("c1").unwrap();
    assert_eq!(record.blob_handle(PointerSlot::Draft), Some("new"));
    assert_eq!(record.version(PointerSlot::Draft), 1);
    assert!(registry.all().is_empty());
}
