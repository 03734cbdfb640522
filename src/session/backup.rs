//! Mirroring session credentials between the bridge and SQLite.
//!
//! Restore runs once at startup (before the first connect); backup runs as
//! the debounced flush target whenever the session's auth material settles.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::store::CredentialStore;

use super::bridge::BridgeClient;
use super::debounce::FlushTarget;
use super::SessionError;

/// Moves credential material between the bridge and the credential store.
#[derive(Debug)]
pub struct SessionBackup {
    bridge: Arc<BridgeClient>,
    store: CredentialStore,
}

impl SessionBackup {
    /// Create a backup pipeline between `bridge` and `store`.
    pub fn new(bridge: Arc<BridgeClient>, store: CredentialStore) -> Self {
        Self { bridge, store }
    }

    /// Restore persisted credentials into the bridge.
    ///
    /// Returns `true` when material was found and imported — the session
    /// will then skip the QR challenge — and `false` on a first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted material cannot be enumerated or
    /// the bridge rejects the import. Callers treat this as fatal to the
    /// restore attempt and report it rather than retrying.
    pub async fn restore(&self) -> Result<bool, SessionError> {
        let blobs = self.store.load_all().await?;
        if blobs.is_empty() {
            info!("no persisted session found, QR challenge expected");
            return Ok(false);
        }
        self.bridge.import_credentials(&blobs).await?;
        info!(blobs = blobs.len(), "session restored from database");
        Ok(true)
    }

    /// Persist the bridge's current credential material.
    ///
    /// Per-blob write failures are swallowed and logged — individual blobs
    /// disappearing under rapid rotation is expected. A failure to
    /// enumerate the material at all aborts the batch with a warning.
    pub async fn backup(&self) {
        let blobs = match self.bridge.export_credentials().await {
            Ok(blobs) => blobs,
            Err(e) => {
                warn!(error = %e, "credential backup skipped: export failed");
                return;
            }
        };
        let mut saved = 0usize;
        for blob in &blobs {
            match self.store.save(blob).await {
                Ok(()) => saved += 1,
                Err(e) => warn!(name = %blob.name, error = %e, "failed to persist credential blob"),
            }
        }
        info!(saved, total = blobs.len(), "session backup persisted");
    }
}

#[async_trait]
impl FlushTarget for SessionBackup {
    async fn flush(&self) {
        self.backup().await;
    }
}
