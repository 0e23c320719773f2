use std::io::Write;
use std::time::Duration;

use bytes::Bytes;
use course_blob::{
    BlobError, ChunkedUploadCoordinator, MemoryUploadSessionStore, Operation, SessionReaper, UploadRules,
    UploadSessionStore,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;

fn gzip(value: &serde_json::Value) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(serde_json::to_vec(value).unwrap().as_slice())
        .unwrap();
    encoder.finish().unwrap()
}

fn course_payload() -> serde_json::Value {
    json!({
        "meta": { "title": "Chunked" },
        "sections": [{ "id": "s1", "title": "One", "lessonIds": ["l1", "l2", "l3"] }],
        "lessons": {
            "l1": { "blocks": [{ "type": "text", "text": "a" }] },
            "l2": { "blocks": [{ "type": "text", "text": "b" }] },
            "l3": { "blocks": [] }
        }
    })
}

fn split(bytes: &[u8], parts: usize) -> Vec<Bytes> {
    let size = bytes.len().div_ceil(parts);
    bytes.chunks(size).map(Bytes::copy_from_slice).collect()
}

fn coordinator() -> (ChunkedUploadCoordinator, MemoryUploadSessionStore) {
    let store = MemoryUploadSessionStore::new();
    (
        ChunkedUploadCoordinator::new(store.clone(), UploadRules::default()),
        store,
    )
}

#[tokio::test]
async fn out_of_order_chunks_reassemble_identically() {
    let (coordinator, _) = coordinator();
    let payload = gzip(&course_payload());
    let chunks = split(&payload, 3);
    let session = coordinator
        .init("c1", chunks.len() as u32, Operation::Checkpoint)
        .await
        .unwrap();

    for index in [2u32, 0, 1] {
        coordinator
            .accept_chunk(&session.upload_id, index, chunks[index as usize].clone())
            .await
            .unwrap();
    }

    let upload = coordinator.complete(&session.upload_id).await.unwrap();
    assert_eq!(upload.course_id, "c1");
    assert_eq!(upload.operation, Operation::Checkpoint);
    assert_eq!(upload.course.id, "c1");
    assert_eq!(upload.course.lesson_count(), 3);
    assert_eq!(upload.compressed_bytes, payload.len() as u64);
}

#[tokio::test]
async fn complete_with_missing_chunks_is_incomplete_and_keeps_session() {
    let (coordinator, _) = coordinator();
    let session = coordinator.init("c1", 3, Operation::Publish).await.unwrap();
    coordinator
        .accept_chunk(&session.upload_id, 0, Bytes::from_static(b"x"))
        .await
        .unwrap();

    let err = coordinator.complete(&session.upload_id).await.unwrap_err();
    assert!(matches!(err, BlobError::Incomplete { expected: 3, received: 1 }));

    // Still resumable
    coordinator
        .accept_chunk(&session.upload_id, 1, Bytes::from_static(b"y"))
        .await
        .unwrap();
}

#[tokio::test]
async fn second_complete_is_not_found() {
    let (coordinator, _) = coordinator();
    let session = coordinator.init("c1", 1, Operation::Checkpoint).await.unwrap();
    coordinator
        .accept_chunk(&session.upload_id, 0, Bytes::from(gzip(&course_payload())))
        .await
        .unwrap();

    coordinator.complete(&session.upload_id).await.unwrap();
    let err = coordinator.complete(&session.upload_id).await.unwrap_err();
    assert!(matches!(err, BlobError::UploadNotFound { .. }));
}

#[tokio::test]
async fn corrupt_payload_consumes_the_session() {
    let (coordinator, store) = coordinator();
    let session = coordinator.init("c1", 2, Operation::Checkpoint).await.unwrap();
    let gz = gzip(&course_payload());
    // Valid gzip header, truncated body
    coordinator
        .accept_chunk(&session.upload_id, 0, Bytes::copy_from_slice(&gz[..10]))
        .await
        .unwrap();
    coordinator
        .accept_chunk(&session.upload_id, 1, Bytes::from_static(b"garbage"))
        .await
        .unwrap();

    let err = coordinator.complete(&session.upload_id).await.unwrap_err();
    assert!(matches!(err, BlobError::Corrupt { .. }));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn out_of_range_index_and_unknown_session_are_not_found() {
    let (coordinator, _) = coordinator();
    let session = coordinator.init("c1", 2, Operation::Checkpoint).await.unwrap();

    let err = coordinator
        .accept_chunk(&session.upload_id, 2, Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let unknown = course_blob::UploadId::new();
    let err = coordinator
        .accept_chunk(&unknown, 0, Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn init_validates_parameters() {
    let (coordinator, _) = coordinator();
    assert!(matches!(
        coordinator.init("", 1, Operation::Checkpoint).await.unwrap_err(),
        BlobError::Invalid { .. }
    ));
    assert!(matches!(
        coordinator.init("c1", 0, Operation::Checkpoint).await.unwrap_err(),
        BlobError::Invalid { .. }
    ));
}

#[tokio::test]
async fn evicted_session_rejects_chunks() {
    let store = MemoryUploadSessionStore::new();
    let rules = UploadRules::default().with_session_ttl(Duration::from_secs(300));
    let coordinator = ChunkedUploadCoordinator::new(store.clone(), rules);
    let reaper = SessionReaper::new(coordinator.clone());

    let stale = coordinator.init("c1", 1, Operation::Checkpoint).await.unwrap();
    let fresh = coordinator.init("c2", 1, Operation::Checkpoint).await.unwrap();
    store.set_created_at(&stale.upload_id, chrono::Utc::now() - chrono::Duration::minutes(6));

    assert_eq!(reaper.reap_expired_sessions().await.unwrap(), 1);

    let err = coordinator
        .accept_chunk(&stale.upload_id, 0, Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(coordinator
        .accept_chunk(&fresh.upload_id, 0, Bytes::from_static(b"x"))
        .await
        .is_ok());
}

#[tokio::test]
async fn zero_interval_reaper_keeps_running() {
    let (coordinator, _) = coordinator();
    let reaper = SessionReaper::with_interval(coordinator, Duration::ZERO);

    let task = tokio::spawn(reaper.start());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!task.is_finished());

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn plain_json_payloads_are_accepted() {
    let (coordinator, _) = coordinator();
    let session = coordinator.init("c9", 1, Operation::Publish).await.unwrap();
    let body = serde_json::to_vec(&course_payload()).unwrap();
    coordinator
        .accept_chunk(&session.upload_id, 0, Bytes::from(body))
        .await
        .unwrap();

    let upload = coordinator.complete(&session.upload_id).await.unwrap();
    assert_eq!(upload.course.id, "c9");
    assert_eq!(upload.operation, Operation::Publish);
}
