//! WhatsApp session: bridge client, lifecycle state machine, and debounced
//! credential persistence.
//!
//! The heavy lifting of the WhatsApp protocol lives in a baileys-based
//! sidecar reached over HTTP. This module owns everything stateful around
//! it: the connect/reconnect state machine, the `when_ready()` gate the
//! queue worker waits on, and mirroring the sidecar's auth material into
//! SQLite so restarts skip the QR challenge.

pub mod backup;
pub mod bridge;
pub mod debounce;
pub mod manager;

pub use backup::SessionBackup;
pub use bridge::{BridgeClient, BridgeEvent, SessionTransport};
pub use debounce::{FlushDebouncer, FlushTarget};
pub use manager::ConnectionManager;

/// Errors from the session layer.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// HTTP request to the bridge failed.
    #[error("bridge request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The bridge answered but reported an error.
    #[error("bridge error: {0}")]
    Bridge(String),

    /// Send attempted while the session is not connected. Retryable.
    #[error("session not connected")]
    NotConnected,

    /// The session was explicitly logged out. Terminal — clear persisted
    /// credentials and re-link before restarting.
    #[error("session logged out; run `straylight clear-session` to re-link")]
    LoggedOut,

    /// Persisted credential material could not be enumerated.
    #[error("credential restore failed: {0}")]
    Restore(#[from] crate::store::StoreError),
}

/// Lifecycle states of the messaging session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Start state: a connection attempt is in flight.
    Connecting,
    /// Unauthenticated; a QR challenge is waiting to be scanned.
    AwaitingQr,
    /// Handshake complete; sends are allowed.
    Connected,
    /// Transient disconnect; a retry is scheduled.
    Reconnecting,
    /// Explicit logout. Terminal — no further automatic attempts.
    LoggedOut,
}

impl SessionState {
    /// Human-readable name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::AwaitingQr => "awaiting_qr",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::LoggedOut => "logged_out",
        }
    }
}

/// Baileys status code the bridge reports for an explicit logout.
const LOGGED_OUT_STATUS: u16 = 401;

/// Classified cause of a session close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectCause {
    /// Explicit logout — terminal, requires operator intervention.
    LoggedOut,
    /// Anything else — schedule a reconnect.
    Recoverable,
}

/// Classify a close event from the bridge's disconnect status code.
pub fn classify_disconnect(status_code: Option<u16>) -> DisconnectCause {
    if status_code == Some(LOGGED_OUT_STATUS) {
        DisconnectCause::LoggedOut
    } else {
        DisconnectCause::Recoverable
    }
}
