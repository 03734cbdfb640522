//! Persisted session credentials.
//!
//! The bridge holds the live baileys auth material; this store mirrors it
//! into the `session_credentials` table so a process restart can resume the
//! session without a fresh QR scan. Writes happen through the debounced
//! flush in [`crate::session::debounce`], never on every mutation event.

use sqlx::SqlitePool;
use tracing::{debug, info};

use super::StoreError;

/// One named unit of session authentication material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialBlob {
    /// Unique blob name (e.g. `creds.json`, `app-state-sync-key-....json`).
    pub name: String,
    /// Raw blob content.
    pub content: Vec<u8>,
}

/// Store for session credential blobs.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    db: SqlitePool,
}

impl CredentialStore {
    /// Create a store backed by the given pool.
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Load all persisted credential blobs, ordered by name.
    ///
    /// Returns an empty collection when no session has been persisted yet
    /// (first run, or after [`CredentialStore::clear`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read. That failure is fatal
    /// to the restore attempt — the caller reports it rather than retrying.
    pub async fn load_all(&self) -> Result<Vec<CredentialBlob>, StoreError> {
        let rows: Vec<(String, Vec<u8>)> =
            sqlx::query_as("SELECT name, content FROM session_credentials ORDER BY name")
                .fetch_all(&self.db)
                .await?;
        debug!(blobs = rows.len(), "loaded session credentials");
        Ok(rows
            .into_iter()
            .map(|(name, content)| CredentialBlob { name, content })
            .collect())
    }

    /// Upsert a single credential blob by name. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. Batch callers swallow and log a
    /// per-blob failure instead of aborting the whole flush.
    pub async fn save(&self, blob: &CredentialBlob) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO session_credentials (name, content, updated_at) \
             VALUES (?1, ?2, datetime('now')) \
             ON CONFLICT(name) DO UPDATE SET \
                 content = excluded.content, updated_at = excluded.updated_at",
        )
        .bind(&blob.name)
        .bind(&blob.content)
        .execute(&self.db)
        .await?;
        debug!(name = %blob.name, bytes = blob.content.len(), "credential blob saved");
        Ok(())
    }

    /// Delete all persisted credentials.
    ///
    /// Operator recovery path after a forced logout: the next start will go
    /// through the QR challenge again.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn clear(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM session_credentials")
            .execute(&self.db)
            .await?;
        info!(deleted = result.rows_affected(), "session credentials cleared");
        Ok(result.rows_affected())
    }
}
