//! Durable notification queue.
//!
//! Webhook ingestion appends pending entries; the queue worker is the sole
//! writer of status transitions. [`NotificationQueue::claim_next`] is a
//! single `UPDATE ... RETURNING` statement, so two concurrent workers can
//! never claim the same row — SQLite serializes the statement for us.

use sqlx::SqlitePool;
use tracing::debug;

use super::StoreError;

/// Lifecycle status of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueStatus {
    /// Waiting to be claimed.
    Pending,
    /// Claimed by a worker, in flight.
    Processing,
    /// Handler succeeded.
    Completed,
    /// Handler failed; `error` holds the reason. Not retried automatically.
    Failed,
}

impl QueueStatus {
    /// Returns the string representation stored in SQLite.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse from a SQLite text value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a recognised status.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(StoreError::InvalidEnum {
                field: "status",
                value: other.to_owned(),
            }),
        }
    }
}

/// One unit of durable notification work.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// Store-assigned row id.
    pub id: i64,
    /// Opaque webhook payload as received at ingestion.
    pub payload: serde_json::Value,
    /// Current lifecycle status.
    pub status: QueueStatus,
    /// Failure reason, set by [`NotificationQueue::fail`].
    pub error: Option<String>,
    /// When the entry was enqueued (ISO-8601, set by SQLite).
    pub created_at: String,
    /// When the entry was claimed, if it ever was.
    pub processed_at: Option<String>,
}

type EntryRow = (i64, String, String, Option<String>, String, Option<String>);

fn entry_from_row(row: EntryRow) -> Result<QueueEntry, StoreError> {
    let (id, payload, status, error, created_at, processed_at) = row;
    let payload = serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null);
    Ok(QueueEntry {
        id,
        payload,
        status: QueueStatus::parse(&status)?,
        error,
        created_at,
        processed_at,
    })
}

/// Durable, ordered work list of pending notifications.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    db: SqlitePool,
}

impl NotificationQueue {
    /// Create a queue backed by the given pool.
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Append a pending entry. Order key is creation time.
    ///
    /// Returns the store-assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn enqueue(&self, payload: &serde_json::Value) -> Result<i64, StoreError> {
        let result = sqlx::query("INSERT INTO notification_queue (payload) VALUES (?1)")
            .bind(payload.to_string())
            .execute(&self.db)
            .await?;
        let id = result.last_insert_rowid();
        debug!(id, "notification enqueued");
        Ok(id)
    }

    /// Atomically claim the oldest pending entry.
    ///
    /// Flips it to `processing`, stamps `processed_at`, and returns it.
    /// Returns `None` when the queue is empty; never blocks. The whole claim
    /// is one SQL statement, so no two callers can receive the same entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub async fn claim_next(&self) -> Result<Option<QueueEntry>, StoreError> {
        let row: Option<EntryRow> = sqlx::query_as(
            "UPDATE notification_queue \
             SET status = 'processing', processed_at = datetime('now') \
             WHERE id = (SELECT id FROM notification_queue \
                         WHERE status = 'pending' \
                         ORDER BY created_at, id LIMIT 1) \
             RETURNING id, payload, status, error, created_at, processed_at",
        )
        .fetch_optional(&self.db)
        .await?;
        row.map(entry_from_row).transpose()
    }

    /// Mark a claimed entry as completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn complete(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE notification_queue SET status = 'completed' WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;
        debug!(id, "notification completed");
        Ok(())
    }

    /// Mark a claimed entry as failed and record the reason.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn fail(&self, id: i64, error: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE notification_queue SET status = 'failed', error = ?2 WHERE id = ?1")
            .bind(id)
            .bind(error)
            .execute(&self.db)
            .await?;
        debug!(id, error, "notification failed");
        Ok(())
    }

    /// Fetch an entry by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn get(&self, id: i64) -> Result<Option<QueueEntry>, StoreError> {
        let row: Option<EntryRow> = sqlx::query_as(
            "SELECT id, payload, status, error, created_at, processed_at \
             FROM notification_queue WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(entry_from_row).transpose()
    }

    /// Delete entries older than `retention_days`, regardless of status.
    ///
    /// Bounded retention, not a correctness mechanism — failed entries are
    /// simply kept around long enough for an operator to inspect them.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn purge_expired(&self, retention_days: u32) -> Result<u64, StoreError> {
        let cutoff = format!("-{retention_days} days");
        let result = sqlx::query(
            "DELETE FROM notification_queue WHERE created_at < datetime('now', ?1)",
        )
        .bind(cutoff)
        .execute(&self.db)
        .await?;
        if result.rows_affected() > 0 {
            debug!(purged = result.rows_affected(), "expired queue entries removed");
        }
        Ok(result.rows_affected())
    }
}
