use course_core::{CourseMeta, PointerSlot, PointerWrite, SnapshotBlob};
use course_queue::{FileRegistry, RegistryBackend, SyncEntry, SyncKey};

fn entry(course_id: &str, handle: &str) -> SyncEntry {
    let write = PointerWrite::new(
        PointerSlot::Published,
        SnapshotBlob {
            blob_handle: handle.to_string(),
            hash: format!("hash-{handle}"),
            lesson_count: 1,
            block_count: 0,
            size_bytes: 10,
        },
        CourseMeta::default(),
        vec![],
    );
    SyncEntry::from_write(course_id, &write)
}

#[tokio::test]
async fn entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("registry.json");

    {
        let registry = FileRegistry::open(&path).await.unwrap();
        registry.enqueue(entry("c1", "f1")).await.unwrap();
        registry.enqueue(entry("c2", "f2")).await.unwrap();
        registry
            .record_failure(&SyncKey::new("c2", PointerSlot::Published), "quota")
            .await
            .unwrap();
    }

    let reopened = FileRegistry::open(&path).await.unwrap();
    assert_eq!(reopened.pending_count().await.unwrap(), 2);
    let c2 = reopened
        .get(&SyncKey::new("c2", PointerSlot::Published))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(c2.attempts, 1);
    assert_eq!(c2.last_error.as_deref(), Some("quota"));
}

#[tokio::test]
async fn synced_entries_are_compacted_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");
    let registry = FileRegistry::open(&path).await.unwrap();
    let key = SyncKey::new("c1", PointerSlot::Published);

    registry.enqueue(entry("c1", "f1")).await.unwrap();
    assert!(registry.mark_synced(&key, "f1").await.unwrap());
    assert_eq!(registry.compact().await.unwrap(), 1);

    let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["entries"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn missing_file_is_an_empty_registry() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FileRegistry::open(dir.path().join("none.json")).await.unwrap();
    assert_eq!(registry.pending_count().await.unwrap(), 0);
    assert!(registry.pending().await.unwrap().is_empty());
}
