//! Webhook ingestion endpoint.
//!
//! The commerce platform POSTs order events here; each accepted body
//! becomes a pending queue entry and the response is sent before any
//! processing happens. Authentication is an HMAC-SHA256 signature over the
//! raw request body (`x-hub-signature-256: sha256=<hex>`); when no secret
//! is configured, verification is skipped and every request is trusted —
//! useful for local testing, logged loudly at startup.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::{info, warn};

use crate::store::NotificationQueue;

/// Header carrying the request signature.
const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Shared state for the webhook routes.
#[derive(Debug)]
pub struct WebhookState {
    /// Queue receiving accepted payloads.
    pub queue: NotificationQueue,
    /// Shared HMAC secret; `None` disables verification.
    pub secret: Option<String>,
}

/// Build the ingestion router.
pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/orders", post(receive_order_webhook))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn receive_order_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    if let Some(secret) = state.secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .unwrap_or("");
        if verify_signature(body.as_bytes(), signature, secret).is_err() {
            warn!("webhook rejected: signature verification failed");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid signature"})),
            );
        }
    }

    let payload: serde_json::Value = match serde_json::from_str(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "webhook rejected: body is not valid JSON");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "invalid JSON body"})),
            );
        }
    };

    match state.queue.enqueue(&payload).await {
        Ok(id) => {
            info!(
                id,
                order_id = payload.get("id").and_then(serde_json::Value::as_i64),
                "webhook enqueued"
            );
            (StatusCode::OK, Json(json!({"enqueued": id})))
        }
        Err(e) => {
            warn!(error = %e, "failed to enqueue webhook");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "failed to enqueue"})),
            )
        }
    }
}

/// Verify an `sha256=<hex>` signature over the raw body.
fn verify_signature(payload: &[u8], signature_header: &str, secret: &str) -> Result<(), ()> {
    let digest_hex = signature_header.strip_prefix("sha256=").ok_or(())?;
    let signature = decode_hex(digest_hex)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| ())?;
    mac.update(payload);
    mac.verify_slice(&signature).map_err(|_| ())
}

fn decode_hex(raw: &str) -> Result<Vec<u8>, ()> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() % 2 != 0 {
        return Err(());
    }
    (0..trimmed.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&trimmed[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

/// Sign a body the way the platform does. Used by tests and operator
/// tooling to produce valid requests.
pub fn sign_body(payload: &[u8], secret: &str) -> String {
    // HMAC accepts keys of any length; new_from_slice cannot fail here.
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC key of any length is valid");
    mac.update(payload);
    let digest = mac.finalize().into_bytes();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("sha256={hex}")
}
