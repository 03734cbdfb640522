//! Tests for `src/store/mod.rs` — opening and schema bootstrap.

use serde_json::json;

use straylight::store::{self, NotificationQueue, QueueStatus};

#[tokio::test]
async fn open_creates_the_database_file() {
    let dir = tempfile::tempdir().expect("tempdir should create");
    let path = dir.path().join("straylight.db");

    let pool = store::open(&path).await.expect("open should succeed");
    drop(pool);

    assert!(path.exists());
}

#[tokio::test]
async fn data_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir should create");
    let path = dir.path().join("straylight.db");

    let pool = store::open(&path).await.expect("open should succeed");
    let queue = NotificationQueue::new(pool.clone());
    let id = queue
        .enqueue(&json!({"event": "order/paid", "id": 42}))
        .await
        .expect("enqueue should succeed");
    pool.close().await;

    // The schema is idempotent, so reopening an existing file is safe.
    let pool = store::open(&path).await.expect("reopen should succeed");
    let queue = NotificationQueue::new(pool);
    let entry = queue
        .get(id)
        .await
        .expect("get should succeed")
        .expect("entry should have survived");
    assert_eq!(entry.status, QueueStatus::Pending);
    assert_eq!(entry.payload["id"], 42);
}
