//! Turning queued webhook payloads into delivered WhatsApp messages.

pub mod composer;
pub mod worker;

use serde::Deserialize;

pub use composer::{jid_for_phone, EventTemplates};
pub use worker::{NotificationHandler, OrderNotifier, QueueWorker};

/// Errors from notification handling. Each one is recorded against the
/// queue entry that produced it; none of them stop the worker loop.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The queued payload does not look like an order event.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Order lookup failed or the order is missing required data.
    #[error(transparent)]
    Commerce(#[from] crate::commerce::CommerceError),

    /// The session refused the send (usually not connected — retryable by
    /// re-enqueueing the event).
    #[error(transparent)]
    Session(#[from] crate::session::SessionError),
}

/// The order-event shape the ingestion boundary enqueues.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderEvent {
    /// Event kind, e.g. `order/paid`.
    pub event: String,
    /// Platform order id.
    pub id: i64,
}

impl OrderEvent {
    /// Parse an order event out of an opaque queue payload.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::InvalidPayload`] when the payload lacks the
    /// `event`/`id` fields.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, NotifyError> {
        serde_json::from_value(payload.clone())
            .map_err(|e| NotifyError::InvalidPayload(e.to_string()))
    }
}
