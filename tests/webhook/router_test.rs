//! Tests for `src/webhook.rs` — ingestion routes and signature checks.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use straylight::store::{self, NotificationQueue, QueueStatus};
use straylight::webhook::{self, WebhookState};

const SECRET: &str = "platform-shared-secret";

async fn setup_router(secret: Option<&str>) -> (Router, NotificationQueue) {
    let pool = store::open_in_memory()
        .await
        .expect("in-memory store should open");
    let queue = NotificationQueue::new(pool);
    let state = Arc::new(WebhookState {
        queue: queue.clone(),
        secret: secret.map(str::to_owned),
    });
    (webhook::router(state), queue)
}

fn order_request(body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/orders")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("x-hub-signature-256", signature);
    }
    builder
        .body(Body::from(body.to_owned()))
        .expect("request should build")
}

#[tokio::test]
async fn signed_webhook_is_enqueued() {
    let (router, queue) = setup_router(Some(SECRET)).await;
    let body = r#"{"event":"order/paid","id":42}"#;
    let signature = webhook::sign_body(body.as_bytes(), SECRET);

    let response = router
        .oneshot(order_request(body, Some(&signature)))
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);

    let entry = queue
        .claim_next()
        .await
        .expect("claim should succeed")
        .expect("entry should have been enqueued");
    assert_eq!(entry.status, QueueStatus::Processing);
    assert_eq!(entry.payload["event"], "order/paid");
    assert_eq!(entry.payload["id"], 42);
}

#[tokio::test]
async fn bad_signature_is_rejected() {
    let (router, queue) = setup_router(Some(SECRET)).await;
    let body = r#"{"event":"order/paid","id":42}"#;
    let signature = webhook::sign_body(body.as_bytes(), "some-other-secret");

    let response = router
        .oneshot(order_request(body, Some(&signature)))
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let entry = queue.claim_next().await.expect("claim should succeed");
    assert!(entry.is_none(), "rejected webhook must not be enqueued");
}

#[tokio::test]
async fn missing_signature_is_rejected_when_secret_is_set() {
    let (router, queue) = setup_router(Some(SECRET)).await;

    let response = router
        .oneshot(order_request(r#"{"event":"order/paid","id":42}"#, None))
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let entry = queue.claim_next().await.expect("claim should succeed");
    assert!(entry.is_none());
}

#[tokio::test]
async fn unsigned_webhook_is_accepted_without_a_secret() {
    let (router, queue) = setup_router(None).await;

    let response = router
        .oneshot(order_request(r#"{"event":"order/paid","id":42}"#, None))
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);

    let entry = queue.claim_next().await.expect("claim should succeed");
    assert!(entry.is_some());
}

#[tokio::test]
async fn invalid_json_body_is_rejected() {
    let (router, queue) = setup_router(Some(SECRET)).await;
    let body = "not json at all";
    let signature = webhook::sign_body(body.as_bytes(), SECRET);

    let response = router
        .oneshot(order_request(body, Some(&signature)))
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let entry = queue.claim_next().await.expect("claim should succeed");
    assert!(entry.is_none());
}

#[tokio::test]
async fn health_endpoint_responds() {
    let (router, _queue) = setup_router(None).await;

    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);
}
