//! Tests for `src/notify/worker.rs` — claim/process/finalize loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tokio::sync::mpsc;
use tower::ServiceExt;

use straylight::notify::{NotificationHandler, NotifyError, QueueWorker};
use straylight::session::bridge::BridgeEvent;
use straylight::session::{BridgeClient, ConnectionManager, FlushDebouncer, FlushTarget};
use straylight::store::{self, NotificationQueue, QueueStatus, StatusStore};
use straylight::webhook::{self, WebhookState};

struct NullTarget;

#[async_trait]
impl FlushTarget for NullTarget {
    async fn flush(&self) {}
}

/// Handler scripted by the payload itself: `{"fail": true}` errors,
/// anything else succeeds.
struct ScriptedHandler;

#[async_trait]
impl NotificationHandler for ScriptedHandler {
    async fn handle(&self, payload: &serde_json::Value) -> Result<(), NotifyError> {
        if payload.get("fail").and_then(serde_json::Value::as_bool) == Some(true) {
            return Err(NotifyError::InvalidPayload("scripted failure".to_owned()));
        }
        Ok(())
    }
}

async fn setup() -> (NotificationQueue, Arc<ConnectionManager>, mpsc::Sender<BridgeEvent>) {
    let pool = store::open_in_memory()
        .await
        .expect("in-memory store should open");
    let queue = NotificationQueue::new(pool.clone());

    let bridge = Arc::new(BridgeClient::new("http://127.0.0.1:1".to_owned()));
    let debouncer = FlushDebouncer::spawn(Arc::new(NullTarget), Duration::from_secs(60));
    let manager = ConnectionManager::new(
        bridge,
        StatusStore::new(pool),
        debouncer,
        Duration::from_secs(60),
    );

    let (event_tx, event_rx) = mpsc::channel(8);
    tokio::spawn(Arc::clone(&manager).run(event_rx));

    (queue, manager, event_tx)
}

#[tokio::test]
async fn worker_completes_and_fails_entries() {
    let (queue, manager, event_tx) = setup().await;

    let ok_id = queue
        .enqueue(&json!({"event": "order/paid", "id": 1}))
        .await
        .expect("enqueue should succeed");
    let bad_id = queue
        .enqueue(&json!({"fail": true}))
        .await
        .expect("enqueue should succeed");

    event_tx
        .send(BridgeEvent::Open)
        .await
        .expect("event should be accepted");
    manager
        .when_ready()
        .await
        .expect("session should become ready");

    let worker = QueueWorker::new(
        queue.clone(),
        manager,
        Arc::new(ScriptedHandler),
        Duration::from_millis(10),
    );
    tokio::spawn(worker.run());

    tokio::time::sleep(Duration::from_millis(200)).await;

    let ok_entry = queue
        .get(ok_id)
        .await
        .expect("get should succeed")
        .expect("entry should exist");
    assert_eq!(ok_entry.status, QueueStatus::Completed);
    assert!(ok_entry.error.is_none());

    let bad_entry = queue
        .get(bad_id)
        .await
        .expect("get should succeed")
        .expect("entry should exist");
    assert_eq!(bad_entry.status, QueueStatus::Failed);
    assert_eq!(
        bad_entry.error.as_deref(),
        Some("invalid payload: scripted failure")
    );
}

#[tokio::test]
async fn ingestion_accepts_webhooks_while_the_session_is_pending() {
    // Webhook ingestion and the delivery worker are decoupled: on a first
    // run the QR challenge can sit unscanned for minutes, and events arriving
    // in that window must be accepted and held, not refused.
    let (queue, manager, event_tx) = setup().await;
    let router = webhook::router(Arc::new(WebhookState {
        queue: queue.clone(),
        secret: None,
    }));

    let worker = QueueWorker::new(
        queue.clone(),
        Arc::clone(&manager),
        Arc::new(ScriptedHandler),
        Duration::from_millis(10),
    );
    tokio::spawn(worker.run());

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/orders")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"event":"order/paid","id":5}"#))
                .expect("request should build"),
        )
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let reply: serde_json::Value = serde_json::from_slice(&body).expect("reply should parse");
    let id = reply["enqueued"].as_i64().expect("reply carries the id");

    // Held, untouched, while the session is down.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let entry = queue
        .get(id)
        .await
        .expect("get should succeed")
        .expect("entry should exist");
    assert_eq!(entry.status, QueueStatus::Pending);

    // Once the session opens, the held entry drains.
    event_tx
        .send(BridgeEvent::Open)
        .await
        .expect("event should be accepted");
    tokio::time::sleep(Duration::from_millis(200)).await;
    let entry = queue
        .get(id)
        .await
        .expect("get should succeed")
        .expect("entry should exist");
    assert_eq!(entry.status, QueueStatus::Completed);
}

#[tokio::test]
async fn worker_does_not_consume_before_the_session_is_ready() {
    let (queue, manager, event_tx) = setup().await;

    let id = queue
        .enqueue(&json!({"event": "order/paid", "id": 9}))
        .await
        .expect("enqueue should succeed");

    let worker = QueueWorker::new(
        queue.clone(),
        Arc::clone(&manager),
        Arc::new(ScriptedHandler),
        Duration::from_millis(10),
    );
    tokio::spawn(worker.run());

    // No open event yet: the entry must stay untouched.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let entry = queue
        .get(id)
        .await
        .expect("get should succeed")
        .expect("entry should exist");
    assert_eq!(entry.status, QueueStatus::Pending);

    event_tx
        .send(BridgeEvent::Open)
        .await
        .expect("event should be accepted");

    tokio::time::sleep(Duration::from_millis(200)).await;
    let entry = queue
        .get(id)
        .await
        .expect("get should succeed")
        .expect("entry should exist");
    assert_eq!(entry.status, QueueStatus::Completed);
}
