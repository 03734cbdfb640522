//! Tests for `src/store/queue.rs` — durable notification queue.

use serde_json::json;

use straylight::store::{self, NotificationQueue, QueueStatus};

async fn setup_queue() -> NotificationQueue {
    let pool = store::open_in_memory()
        .await
        .expect("in-memory store should open");
    NotificationQueue::new(pool)
}

#[tokio::test]
async fn enqueue_claim_complete_lifecycle() {
    let queue = setup_queue().await;
    let payload = json!({"event": "order/paid", "id": 42});

    let id = queue.enqueue(&payload).await.expect("enqueue should succeed");

    let entry = queue
        .claim_next()
        .await
        .expect("claim should succeed")
        .expect("entry should be claimable");
    assert_eq!(entry.id, id);
    assert_eq!(entry.payload, payload);
    assert_eq!(entry.status, QueueStatus::Processing);
    assert!(entry.processed_at.is_some());

    queue.complete(id).await.expect("complete should succeed");

    let stored = queue
        .get(id)
        .await
        .expect("get should succeed")
        .expect("entry should still exist");
    assert_eq!(stored.status, QueueStatus::Completed);
    assert!(stored.error.is_none());

    // Nothing pending remains.
    let next = queue.claim_next().await.expect("claim should succeed");
    assert!(next.is_none());
}

#[tokio::test]
async fn claim_on_empty_queue_returns_none() {
    let queue = setup_queue().await;
    let entry = queue.claim_next().await.expect("claim should succeed");
    assert!(entry.is_none());
}

#[tokio::test]
async fn claims_follow_insertion_order() {
    let queue = setup_queue().await;
    let mut ids = Vec::new();
    for n in 0..3 {
        let id = queue
            .enqueue(&json!({"event": "order/paid", "id": n}))
            .await
            .expect("enqueue should succeed");
        ids.push(id);
    }

    for expected in ids {
        let entry = queue
            .claim_next()
            .await
            .expect("claim should succeed")
            .expect("entry should be claimable");
        assert_eq!(entry.id, expected);
    }
}

#[tokio::test]
async fn failed_entry_records_reason() {
    let queue = setup_queue().await;
    let id = queue
        .enqueue(&json!({"event": "order/paid", "id": 7}))
        .await
        .expect("enqueue should succeed");
    queue
        .claim_next()
        .await
        .expect("claim should succeed")
        .expect("entry should be claimable");

    queue
        .fail(id, "order has no phone number")
        .await
        .expect("fail should succeed");

    let stored = queue
        .get(id)
        .await
        .expect("get should succeed")
        .expect("entry should still exist");
    assert_eq!(stored.status, QueueStatus::Failed);
    assert_eq!(stored.error.as_deref(), Some("order has no phone number"));

    // Failed entries are not retried.
    let next = queue.claim_next().await.expect("claim should succeed");
    assert!(next.is_none());
}

#[tokio::test]
async fn concurrent_claims_never_hand_out_the_same_entry() {
    let queue = setup_queue().await;
    let total = 10;
    for n in 0..total {
        queue
            .enqueue(&json!({"event": "order/paid", "id": n}))
            .await
            .expect("enqueue should succeed");
    }

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let queue = queue.clone();
        tasks.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            while let Some(entry) = queue.claim_next().await.expect("claim should succeed") {
                claimed.push(entry.id);
            }
            claimed
        }));
    }

    let mut all: Vec<i64> = Vec::new();
    for task in tasks {
        all.extend(task.await.expect("task should not panic"));
    }
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), total, "every entry claimed exactly once");
}

#[tokio::test]
async fn purge_removes_only_expired_entries() {
    let pool = store::open_in_memory()
        .await
        .expect("in-memory store should open");
    let queue = NotificationQueue::new(pool.clone());

    let old_id = queue
        .enqueue(&json!({"event": "order/paid", "id": 1}))
        .await
        .expect("enqueue should succeed");
    let fresh_id = queue
        .enqueue(&json!({"event": "order/paid", "id": 2}))
        .await
        .expect("enqueue should succeed");

    // Back-date the first entry past the retention window.
    sqlx::query(
        "UPDATE notification_queue SET created_at = datetime('now', '-20 days') WHERE id = ?1",
    )
    .bind(old_id)
    .execute(&pool)
    .await
    .expect("back-date should succeed");

    let purged = queue
        .purge_expired(14)
        .await
        .expect("purge should succeed");
    assert_eq!(purged, 1);

    assert!(queue.get(old_id).await.expect("get should succeed").is_none());
    assert!(queue.get(fresh_id).await.expect("get should succeed").is_some());
}
