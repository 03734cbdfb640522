//! HTTP client for the baileys sidecar bridge.
//!
//! All WhatsApp operations go through this client. The bridge exposes a
//! small JSON API: session control, text sends, credential export/import,
//! and a long-poll endpoint that streams session events.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::store::CredentialBlob;

use super::SessionError;

/// Default port the bridge listens on.
pub const DEFAULT_BRIDGE_PORT: u16 = 3001;

/// HTTP connect timeout for the reqwest client.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// HTTP request timeout for normal operations.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Long-poll timeout for the event listener client (seconds).
const POLL_TIMEOUT_SECS: u64 = 60;

/// Maximum reconnect backoff for the event listener (milliseconds).
const MAX_BACKOFF_MS: u64 = 30_000;

/// A session event from the bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeEvent {
    /// A QR challenge is waiting to be scanned.
    #[serde(rename = "qr")]
    Qr {
        /// QR payload to render for the operator.
        code: String,
    },
    /// Handshake completed; the session can send.
    #[serde(rename = "open")]
    Open,
    /// The session closed.
    #[serde(rename = "close")]
    Close {
        /// Baileys disconnect status code, if available.
        status_code: Option<u16>,
        /// Human-readable reason, if available.
        reason: Option<String>,
    },
    /// The session's auth material mutated.
    #[serde(rename = "creds")]
    CredsChanged,
}

/// A credential blob on the bridge wire (content is base64).
#[derive(Debug, Serialize, Deserialize)]
struct WireBlob {
    name: String,
    content: String,
}

/// Response envelope from the bridge HTTP API.
#[derive(Deserialize)]
struct BridgeResponse<T> {
    #[allow(dead_code)]
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

/// Client for the baileys bridge HTTP API.
#[derive(Debug)]
pub struct BridgeClient {
    client: reqwest::Client,
    base_url: String,
}

impl BridgeClient {
    /// Create a new client pointing at the given base URL.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client with timeouts, using default");
                reqwest::Client::default()
            });
        Self { client, base_url }
    }

    /// Returns the base URL of the bridge.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the bridge to (re)connect its WhatsApp session.
    ///
    /// Returns once the bridge has accepted the request; the outcome arrives
    /// later as [`BridgeEvent`]s on the long-poll stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the bridge is unreachable or rejects the request.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let url = format!("{}/session/connect", self.base_url);
        let resp = self.client.post(&url).send().await?;
        if !resp.status().is_success() {
            let body: BridgeResponse<()> = resp.json().await?;
            return Err(SessionError::Bridge(
                body.error.unwrap_or_else(|| "connect rejected".to_owned()),
            ));
        }
        debug!("session connect requested");
        Ok(())
    }

    /// Send a text message to the given JID.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] on a non-success response —
    /// the bridge refuses sends while its socket is down.
    pub async fn send_text(&self, jid: &str, text: &str) -> Result<(), SessionError> {
        let url = format!("{}/send", self.base_url);
        let body = serde_json::json!({ "jid": jid, "text": text });
        let resp = self.client.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body_text = resp.text().await.unwrap_or_default();
            warn!(%status, "bridge send failed: {body_text}");
            return Err(SessionError::NotConnected);
        }
        debug!(jid, "message sent");
        Ok(())
    }

    /// Export the bridge's current credential material.
    ///
    /// A blob whose content fails to decode is skipped with a warning; a
    /// failure to enumerate at all is returned to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the bridge is unreachable or the listing fails.
    pub async fn export_credentials(&self) -> Result<Vec<CredentialBlob>, SessionError> {
        use base64::Engine as _;

        let url = format!("{}/credentials", self.base_url);
        let resp = self.client.get(&url).send().await?;
        let body: BridgeResponse<Vec<WireBlob>> = resp.json().await?;
        let wire = body.data.ok_or_else(|| {
            SessionError::Bridge(
                body.error
                    .unwrap_or_else(|| "credential export failed".to_owned()),
            )
        })?;

        let mut blobs = Vec::with_capacity(wire.len());
        for item in wire {
            match base64::engine::general_purpose::STANDARD.decode(&item.content) {
                Ok(content) => blobs.push(CredentialBlob {
                    name: item.name,
                    content,
                }),
                Err(e) => warn!(name = %item.name, error = %e, "skipping undecodable credential blob"),
            }
        }
        Ok(blobs)
    }

    /// Import credential material into the bridge before connecting.
    ///
    /// # Errors
    ///
    /// Returns an error if the bridge is unreachable or rejects the blobs.
    pub async fn import_credentials(&self, blobs: &[CredentialBlob]) -> Result<(), SessionError> {
        use base64::Engine as _;

        let wire: Vec<WireBlob> = blobs
            .iter()
            .map(|b| WireBlob {
                name: b.name.clone(),
                content: base64::engine::general_purpose::STANDARD.encode(&b.content),
            })
            .collect();
        let url = format!("{}/credentials", self.base_url);
        let resp = self.client.post(&url).json(&wire).send().await?;
        if !resp.status().is_success() {
            let body: BridgeResponse<()> = resp.json().await?;
            return Err(SessionError::Bridge(
                body.error
                    .unwrap_or_else(|| "credential import rejected".to_owned()),
            ));
        }
        info!(blobs = blobs.len(), "credentials imported into bridge");
        Ok(())
    }
}

/// The session operations the connection manager drives.
///
/// [`BridgeClient`] is the production implementation; the seam exists so
/// lifecycle behavior can be exercised against a scripted transport.
#[async_trait]
pub trait SessionTransport: Send + Sync + 'static {
    /// Ask for a session (re)connect. See [`BridgeClient::connect`].
    async fn connect(&self) -> Result<(), SessionError>;

    /// Send a text message to a JID. See [`BridgeClient::send_text`].
    async fn send_text(&self, jid: &str, text: &str) -> Result<(), SessionError>;
}

#[async_trait]
impl SessionTransport for BridgeClient {
    async fn connect(&self) -> Result<(), SessionError> {
        BridgeClient::connect(self).await
    }

    async fn send_text(&self, jid: &str, text: &str) -> Result<(), SessionError> {
        BridgeClient::send_text(self, jid, text).await
    }
}

/// Spawn an event listener that forwards bridge events to the given channel.
///
/// Returns immediately. The listener runs as a background Tokio task and
/// reconnects automatically with exponential backoff. It stops when the
/// receiver side of `event_tx` is dropped.
pub fn spawn_event_listener(
    base_url: String,
    event_tx: mpsc::Sender<BridgeEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let poll_url = format!("{base_url}/events/poll");
        let mut backoff_ms: u64 = 1000;

        loop {
            info!(url = %poll_url, "connecting to bridge event stream");

            match poll_events(&poll_url, &event_tx).await {
                Ok(()) => {
                    info!("bridge event stream closed normally");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, backoff_ms, "bridge event stream error, reconnecting");
                    tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                    backoff_ms = backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
                }
            }
        }
    })
}

/// Poll the bridge for events in a loop. Returns `Err` on non-timeout
/// network errors so the caller can reconnect with backoff.
async fn poll_events(
    poll_url: &str,
    event_tx: &mpsc::Sender<BridgeEvent>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(POLL_TIMEOUT_SECS))
        .build()?;

    loop {
        match client.get(poll_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<Vec<BridgeEvent>>().await {
                    Ok(events) => {
                        for event in events {
                            debug!(?event, "received bridge event");
                            if event_tx.send(event).await.is_err() {
                                // Receiver dropped — shut down cleanly.
                                return Ok(());
                            }
                        }
                    }
                    // A protocol mismatch must be visible in the logs, not
                    // a silently stalled state machine.
                    Err(e) => warn!(error = %e, "discarding undecodable bridge event batch"),
                }
            }
            Ok(resp) => {
                debug!(status = %resp.status(), "event poll returned non-200");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
            Err(e) if e.is_timeout() => {
                // Normal: long-poll timeout expired, just retry immediately.
                continue;
            }
            Err(e) => {
                return Err(e.into());
            }
        }
    }
}
