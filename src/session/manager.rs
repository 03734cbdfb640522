//! Connection lifecycle state machine.
//!
//! Owns the bridge session and every piece of mutable session state. Bridge
//! events flow through one intake method per event kind instead of ad-hoc
//! callbacks, so the whole lifecycle reads as explicit transitions:
//!
//! ```text
//! Connecting -> AwaitingQr -> Connected
//! (AwaitingQr | Connected) -> Reconnecting -> Connecting   (5 s retry)
//!                          -> LoggedOut                    (terminal)
//! ```
//!
//! Dependents never touch the state directly — they wait on
//! [`ConnectionManager::when_ready`] and call
//! [`ConnectionManager::send`], which fails fast while disconnected.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, RwLock};
use tracing::{error, info, warn};

use crate::store::{PublishedStatus, StatusStore};

use super::bridge::{BridgeEvent, SessionTransport};
use super::debounce::FlushDebouncer;
use super::{classify_disconnect, DisconnectCause, SessionError, SessionState};

/// Readiness signal shared with `when_ready` callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    /// Not yet connected for the first time.
    Pending,
    /// First handshake completed.
    Ready,
    /// Logged out before (or after) ever connecting. Permanent.
    Failed,
}

/// Drives the messaging session through its lifecycle.
pub struct ConnectionManager {
    bridge: Arc<dyn SessionTransport>,
    status: StatusStore,
    debouncer: FlushDebouncer,
    state: RwLock<SessionState>,
    ready_tx: watch::Sender<Readiness>,
    retry_delay: Duration,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create a manager in the `Connecting` state.
    pub fn new(
        bridge: Arc<dyn SessionTransport>,
        status: StatusStore,
        debouncer: FlushDebouncer,
        retry_delay: Duration,
    ) -> Arc<Self> {
        let (ready_tx, _) = watch::channel(Readiness::Pending);
        Arc::new(Self {
            bridge,
            status,
            debouncer,
            state: RwLock::new(SessionState::Connecting),
            ready_tx,
            retry_delay,
        })
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Suspend until the first successful transition to `Connected`.
    ///
    /// Resolves immediately for callers arriving after that transition.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::LoggedOut`] — immediately for new callers —
    /// once the session has been explicitly logged out.
    pub async fn when_ready(&self) -> Result<(), SessionError> {
        let mut rx = self.ready_tx.subscribe();
        loop {
            match *rx.borrow_and_update() {
                Readiness::Ready => return Ok(()),
                Readiness::Failed => return Err(SessionError::LoggedOut),
                Readiness::Pending => {}
            }
            if rx.changed().await.is_err() {
                return Err(SessionError::LoggedOut);
            }
        }
    }

    /// Send a text message to a JID.
    ///
    /// # Errors
    ///
    /// Fails fast with [`SessionError::NotConnected`] (retryable) unless the
    /// session is currently `Connected`; a send must never hang waiting for
    /// a reconnect.
    pub async fn send(&self, jid: &str, text: &str) -> Result<(), SessionError> {
        if *self.state.read().await != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }
        self.bridge.send_text(jid, text).await
    }

    /// Consume bridge events until the channel closes or the session is
    /// logged out.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<BridgeEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                BridgeEvent::Qr { code } => self.handle_qr(&code).await,
                BridgeEvent::Open => self.handle_open().await,
                BridgeEvent::Close {
                    status_code,
                    reason,
                } => {
                    let cause = self.handle_close(status_code, reason.as_deref()).await;
                    if cause == DisconnectCause::LoggedOut {
                        break;
                    }
                }
                BridgeEvent::CredsChanged => self.handle_creds_changed(),
            }
        }
        info!("session event loop stopped");
    }

    /// Intake: a QR challenge arrived while unauthenticated.
    pub async fn handle_qr(&self, code: &str) {
        *self.state.write().await = SessionState::AwaitingQr;
        info!("QR challenge received, waiting for scan");
        self.publish(PublishedStatus::AwaitingQr, Some(code)).await;
    }

    /// Intake: the handshake completed.
    pub async fn handle_open(&self) {
        *self.state.write().await = SessionState::Connected;
        info!("session connected");
        self.publish(PublishedStatus::Connected, None).await;
        // Resolves every pending when_ready() waiter; later callers see the
        // stored value without waiting.
        let _ = self.ready_tx.send(Readiness::Ready);
    }

    /// Intake: the session closed. Classifies the cause, transitions, and
    /// (for recoverable causes) schedules a fixed-delay reconnect.
    pub async fn handle_close(
        self: &Arc<Self>,
        status_code: Option<u16>,
        reason: Option<&str>,
    ) -> DisconnectCause {
        let cause = classify_disconnect(status_code);
        match cause {
            DisconnectCause::LoggedOut => {
                *self.state.write().await = SessionState::LoggedOut;
                error!(
                    reason = reason.unwrap_or("logged out"),
                    "session logged out; clear persisted credentials to re-link"
                );
                self.publish(PublishedStatus::Disconnected, None).await;
                let _ = self.ready_tx.send(Readiness::Failed);
            }
            DisconnectCause::Recoverable => {
                *self.state.write().await = SessionState::Reconnecting;
                warn!(
                    status_code,
                    reason = reason.unwrap_or("unknown"),
                    retry_secs = self.retry_delay.as_secs(),
                    "session closed, reconnect scheduled"
                );
                self.publish(PublishedStatus::Disconnected, None).await;
                self.schedule_reconnect();
            }
        }
        cause
    }

    /// Intake: the session's auth material mutated. Re-arms the debounced
    /// persistence flush; every mutation event lands here, not only the
    /// initial handshake.
    pub fn handle_creds_changed(&self) {
        self.debouncer.notify_changed();
    }

    /// Spawn the reconnect task: sleep the fixed delay, then loop back to
    /// `Connecting`. Not cancelable once scheduled — the system always wants
    /// to retry until logged out — but a fresh successful connection
    /// supersedes it.
    fn schedule_reconnect(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(manager.retry_delay).await;
                match *manager.state.read().await {
                    // Superseded or terminal: nothing left to do.
                    SessionState::Connected | SessionState::LoggedOut => return,
                    _ => {}
                }
                *manager.state.write().await = SessionState::Connecting;
                match manager.bridge.connect().await {
                    Ok(()) => return,
                    Err(e) => {
                        warn!(error = %e, "reconnect attempt failed, retrying");
                        *manager.state.write().await = SessionState::Reconnecting;
                    }
                }
            }
        });
    }

    /// Best-effort status publication; the sink is observability only.
    async fn publish(&self, status: PublishedStatus, qr: Option<&str>) {
        if let Err(e) = self.status.publish(status, qr).await {
            warn!(error = %e, "failed to publish connection status");
        }
    }
}
