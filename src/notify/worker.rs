//! Polling queue worker.
//!
//! A long-lived loop: claim the oldest pending entry, run the handler,
//! finalize with `complete` or `fail`. Every failure is scoped to the entry
//! that caused it; the loop itself only ends at process shutdown. The
//! worker waits for the session's first `Connected` before its first claim
//! so queued webhooks from before startup are not burned against a session
//! that cannot send yet.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::commerce::CommerceClient;
use crate::session::ConnectionManager;
use crate::store::NotificationQueue;

use super::composer::{jid_for_phone, EventTemplates};
use super::{NotifyError, OrderEvent};

/// Handles one claimed notification payload.
#[async_trait]
pub trait NotificationHandler: Send + Sync + 'static {
    /// Process a payload end to end. An `Err` is recorded on the entry via
    /// `fail`; it must not be used for control flow beyond that.
    async fn handle(&self, payload: &serde_json::Value) -> Result<(), NotifyError>;
}

/// Production handler: look the order up, compose, send over WhatsApp.
#[derive(Debug)]
pub struct OrderNotifier {
    commerce: CommerceClient,
    session: Arc<ConnectionManager>,
    templates: EventTemplates,
}

impl OrderNotifier {
    /// Create a handler delivering through the given session.
    pub fn new(
        commerce: CommerceClient,
        session: Arc<ConnectionManager>,
        templates: EventTemplates,
    ) -> Self {
        Self {
            commerce,
            session,
            templates,
        }
    }
}

#[async_trait]
impl NotificationHandler for OrderNotifier {
    async fn handle(&self, payload: &serde_json::Value) -> Result<(), NotifyError> {
        let event = OrderEvent::from_payload(payload)?;
        let order = self.commerce.fetch_order(event.id).await?;

        let Some(message) = self.templates.render(&event.event, &order) else {
            // Recognizable but unconfigured event kind: deliberate no-op.
            info!(event = %event.event, order_id = event.id, "no template for event, skipping");
            return Ok(());
        };

        let customer = order.customer()?;
        let jid = jid_for_phone(customer.phone()?);
        self.session.send(&jid, &message).await?;
        info!(order_id = event.id, event = %event.event, "order notification sent");
        Ok(())
    }
}

/// Long-lived polling consumer of the notification queue.
pub struct QueueWorker {
    queue: NotificationQueue,
    session: Arc<ConnectionManager>,
    handler: Arc<dyn NotificationHandler>,
    poll_interval: Duration,
}

impl std::fmt::Debug for QueueWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueWorker")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl QueueWorker {
    /// Create a worker polling `queue` at `poll_interval`.
    pub fn new(
        queue: NotificationQueue,
        session: Arc<ConnectionManager>,
        handler: Arc<dyn NotificationHandler>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            session,
            handler,
            poll_interval,
        }
    }

    /// Run the claim/process/finalize loop until process shutdown.
    ///
    /// Blocks on `when_ready()` before the first claim. If the session
    /// fails permanently before ever connecting, the worker logs and
    /// returns without consuming anything.
    pub async fn run(self) {
        info!("queue worker waiting for session");
        if let Err(e) = self.session.when_ready().await {
            error!(error = %e, "session failed before the worker started");
            return;
        }
        info!(
            poll_secs = self.poll_interval.as_secs(),
            "queue worker started"
        );

        loop {
            match self.queue.claim_next().await {
                Ok(Some(entry)) => self.process(entry.id, &entry.payload).await,
                Ok(None) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    // Transient storage trouble: keep polling.
                    warn!(error = %e, "queue claim failed");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Process one claimed entry and finalize its status.
    async fn process(&self, id: i64, payload: &serde_json::Value) {
        info!(id, "processing notification");
        match self.handler.handle(payload).await {
            Ok(()) => {
                if let Err(e) = self.queue.complete(id).await {
                    warn!(id, error = %e, "failed to mark entry completed");
                } else {
                    info!(id, "notification processed");
                }
            }
            Err(e) => {
                warn!(id, error = %e, "notification handler failed");
                if let Err(e) = self.queue.fail(id, &e.to_string()).await {
                    warn!(id, error = %e, "failed to record entry failure");
                }
            }
        }
    }
}
