//! Connection-status mirror for external observability.
//!
//! A single `bot_status` row (fixed singleton id) reflects the connection
//! manager's latest transition and the current QR challenge, if any. This is
//! a best-effort sink: a dashboard reads it, nothing in the delivery path
//! depends on it, so write failures are logged and ignored by callers.

use sqlx::SqlitePool;
use tracing::debug;

use super::StoreError;

/// Fixed id so the table can only ever hold one row.
const SINGLETON_ID: &str = "main";

/// Published connection states, as read by external dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishedStatus {
    /// A QR challenge is waiting to be scanned.
    AwaitingQr,
    /// Session is up and able to send.
    Connected,
    /// Session is down (initial, reconnecting, or logged out).
    Disconnected,
}

impl PublishedStatus {
    /// Returns the string representation stored in SQLite.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingQr => "WAITING_FOR_QR",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
        }
    }
}

/// Store for the singleton status row.
#[derive(Debug, Clone)]
pub struct StatusStore {
    db: SqlitePool,
}

impl StatusStore {
    /// Create a store backed by the given pool.
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Publish a state transition. `qr_code` carries the current challenge
    /// payload for `AwaitingQr` and clears it otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn publish(
        &self,
        status: PublishedStatus,
        qr_code: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO bot_status (singleton_id, status, qr_code, last_updated_at) \
             VALUES (?1, ?2, ?3, datetime('now')) \
             ON CONFLICT(singleton_id) DO UPDATE SET \
                 status = excluded.status, \
                 qr_code = excluded.qr_code, \
                 last_updated_at = excluded.last_updated_at",
        )
        .bind(SINGLETON_ID)
        .bind(status.as_str())
        .bind(qr_code.unwrap_or(""))
        .execute(&self.db)
        .await?;
        debug!(status = status.as_str(), "connection status published");
        Ok(())
    }

    /// Read the current published status and QR payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn current(&self) -> Result<Option<(String, String)>, StoreError> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT status, qr_code FROM bot_status WHERE singleton_id = ?1",
        )
        .bind(SINGLETON_ID)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }
}
