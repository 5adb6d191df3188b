use std::time::Duration;

use bytes::Bytes;
use dropshare_blob::{
    BlobConfig, BlobError, MemoryObjectStore, ObjectStore, ResumableUpload, StoredObject,
    TransferEvent, UploadMetadata, UploadProgress,
};

fn store_with_chunk(chunk_size: usize) -> MemoryObjectStore {
    MemoryObjectStore::new(
        BlobConfig::new()
            .with_chunk_size(chunk_size)
            .with_public_base_url("https://store/"),
    )
}

async fn next_event(upload: &mut ResumableUpload) -> TransferEvent {
    tokio::time::timeout(Duration::from_secs(1), upload.next_event())
        .await
        .expect("Timeout waiting for transfer event")
        .expect("Transfer ended without a terminal event")
}

/// Drain a transfer, returning the progress seen and the terminal event
async fn drain(upload: &mut ResumableUpload) -> (Vec<UploadProgress>, TransferEvent) {
    let mut progress = Vec::new();
    loop {
        match next_event(upload).await {
            TransferEvent::Progress(p) => progress.push(p),
            terminal => return (progress, terminal),
        }
    }
}

#[tokio::test]
async fn test_transfer_reports_every_chunk_then_completes() {
    let store = store_with_chunk(4);
    let metadata = UploadMetadata::new().with_content_type("image/png");

    let mut upload = store
        .start_resumable_upload("file-upload/demo.png", Bytes::from_static(b"0123456789"), metadata)
        .await
        .unwrap();

    let (progress, terminal) = drain(&mut upload).await;
    let transferred: Vec<u64> = progress.iter().map(|p| p.bytes_transferred).collect();
    assert_eq!(transferred, vec![0, 4, 8, 10]);
    assert!(progress.iter().all(|p| p.total_bytes == 10));
    assert_eq!(progress.last().unwrap().percent(), 100.0);

    let object = match terminal {
        TransferEvent::Completed(object) => object,
        other => panic!("expected completion, got {:?}", other),
    };
    assert_eq!(object.key, "file-upload/demo.png");
    assert_eq!(object.size_bytes, 10);
    assert_eq!(object.content_type.as_deref(), Some("image/png"));
    assert_eq!(&object.upload_id, upload.id());

    assert_eq!(store.get("file-upload/demo.png").unwrap(), Bytes::from_static(b"0123456789"));
    assert_eq!(store.content_type("file-upload/demo.png").as_deref(), Some("image/png"));
}

#[tokio::test]
async fn test_download_url_is_minted_under_public_base() {
    let store = store_with_chunk(1024);
    let mut upload = store
        .start_resumable_upload("file-upload/my report.pdf", Bytes::from_static(b"pdf"), UploadMetadata::new())
        .await
        .unwrap();

    let (_, terminal) = drain(&mut upload).await;
    let TransferEvent::Completed(object) = terminal else {
        panic!("transfer did not complete");
    };

    let url = store.download_url(&object).await.unwrap();
    assert_eq!(url, "https://store/file-upload/my%20report.pdf");
}

#[tokio::test]
async fn test_download_url_for_unknown_object_fails() {
    let store = store_with_chunk(1024);
    let missing = StoredObject::new("file-upload/ghost.txt", 3, dropshare_blob::UploadId::new());

    let result = store.download_url(&missing).await;
    assert!(matches!(result, Err(BlobError::NotFound { key }) if key == "file-upload/ghost.txt"));
}

#[tokio::test]
async fn test_oversized_body_is_rejected_before_starting() {
    let store = MemoryObjectStore::new(BlobConfig::new().with_max_object_bytes(4));

    let result = store
        .start_resumable_upload("big.bin", Bytes::from_static(b"12345"), UploadMetadata::new())
        .await;

    assert!(matches!(result, Err(BlobError::TooLarge { size: 5, max: 4 })));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_empty_key_is_invalid() {
    let store = MemoryObjectStore::default();
    let result = store
        .start_resumable_upload("", Bytes::from_static(b"x"), UploadMetadata::new())
        .await;
    assert!(matches!(result, Err(BlobError::Invalid { .. })));
}

#[tokio::test]
async fn test_empty_body_completes_at_full_progress() {
    let store = store_with_chunk(4);
    let mut upload = store
        .start_resumable_upload("empty.txt", Bytes::new(), UploadMetadata::new())
        .await
        .unwrap();

    let (progress, terminal) = drain(&mut upload).await;
    assert_eq!(progress, vec![UploadProgress::new(0, 0)]);
    assert_eq!(progress[0].percent(), 100.0);
    assert!(matches!(terminal, TransferEvent::Completed(o) if o.size_bytes == 0));
}

#[tokio::test]
async fn test_cancelled_transfer_stores_nothing() {
    let store = store_with_chunk(2);
    let mut upload = store
        .start_resumable_upload("file-upload/a.bin", Bytes::from_static(b"abcdefgh"), UploadMetadata::new())
        .await
        .unwrap();

    // First event is the zero-byte report; cancel right after it
    assert!(matches!(next_event(&mut upload).await, TransferEvent::Progress(p) if p.bytes_transferred == 0));
    upload.cancel();

    let (_, terminal) = drain(&mut upload).await;
    assert!(matches!(terminal, TransferEvent::Cancelled));
    assert!(!store.contains("file-upload/a.bin"));
}

#[tokio::test]
async fn test_paused_transfer_resumes_where_it_stopped() {
    let store = store_with_chunk(2);
    let mut upload = store
        .start_resumable_upload("file-upload/p.bin", Bytes::from_static(b"abcdef"), UploadMetadata::new())
        .await
        .unwrap();
    let controller = upload.controller();

    assert!(matches!(next_event(&mut upload).await, TransferEvent::Progress(p) if p.bytes_transferred == 0));
    assert!(controller.pause());

    // Nothing moves while paused
    let stalled = tokio::time::timeout(Duration::from_millis(50), upload.next_event()).await;
    assert!(stalled.is_err());
    assert!(!store.contains("file-upload/p.bin"));

    assert!(controller.resume());
    let (progress, terminal) = drain(&mut upload).await;
    let transferred: Vec<u64> = progress.iter().map(|p| p.bytes_transferred).collect();
    assert_eq!(transferred, vec![2, 4, 6]);
    assert!(matches!(terminal, TransferEvent::Completed(_)));
}
