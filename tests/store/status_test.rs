//! Tests for `src/store/status.rs` — singleton status row.

use straylight::store::{self, PublishedStatus, StatusStore};

async fn setup_store() -> StatusStore {
    let pool = store::open_in_memory()
        .await
        .expect("in-memory store should open");
    StatusStore::new(pool)
}

#[tokio::test]
async fn current_is_empty_before_first_publish() {
    let store = setup_store().await;
    let current = store.current().await.expect("read should succeed");
    assert!(current.is_none());
}

#[tokio::test]
async fn publish_then_read_back() {
    let store = setup_store().await;

    store
        .publish(PublishedStatus::AwaitingQr, Some("qr-payload"))
        .await
        .expect("publish should succeed");

    let (status, qr) = store
        .current()
        .await
        .expect("read should succeed")
        .expect("row should exist");
    assert_eq!(status, "WAITING_FOR_QR");
    assert_eq!(qr, "qr-payload");
}

#[tokio::test]
async fn publish_overwrites_the_singleton_row() {
    let store = setup_store().await;

    store
        .publish(PublishedStatus::AwaitingQr, Some("qr-payload"))
        .await
        .expect("publish should succeed");
    store
        .publish(PublishedStatus::Connected, None)
        .await
        .expect("publish should succeed");

    let (status, qr) = store
        .current()
        .await
        .expect("read should succeed")
        .expect("row should exist");
    assert_eq!(status, "CONNECTED");
    // The QR payload is cleared once the challenge is no longer live.
    assert_eq!(qr, "");
}
