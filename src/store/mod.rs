//! SQLite persistence: session credentials, the notification queue, and the
//! connection-status row.
//!
//! A single [`SqlitePool`] backs all three tables. The schema lives in
//! `migrations/001_schema.sql` and is applied with `sqlx::raw_sql` on open;
//! every statement in it is idempotent. Queue claims rely on SQLite executing
//! a single `UPDATE ... RETURNING` statement atomically, which is what makes
//! concurrent workers safe without any locking of our own.

pub mod credentials;
pub mod queue;
pub mod status;

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

pub use self::credentials::{CredentialBlob, CredentialStore};
pub use self::queue::{NotificationQueue, QueueEntry, QueueStatus};
pub use self::status::{PublishedStatus, StatusStore};

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An invalid enum value was read from the database.
    #[error("invalid {field} value: {value:?}")]
    InvalidEnum {
        /// Which column contained the bad value.
        field: &'static str,
        /// The unexpected value.
        value: String,
    },
}

/// Bootstrap schema applied on open.
const SCHEMA: &str = include_str!("../../migrations/001_schema.sql");

/// Open (or create) the database at `path` and apply the schema.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or the schema fails to
/// apply. Callers treat this as fatal — the process must not run without
/// its durable state.
pub async fn open(path: &Path) -> Result<SqlitePool, StoreError> {
    let opts = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(opts).await?;
    apply_schema(&pool).await?;
    info!(path = %path.display(), "database opened");
    Ok(pool)
}

/// Open an in-memory database with the schema applied.
///
/// In-memory SQLite databases are per-connection, so the pool is limited to
/// one connection to keep all queries on the same database.
pub async fn open_in_memory() -> Result<SqlitePool, StoreError> {
    let opts = SqliteConnectOptions::new()
        .filename(":memory:")
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await?;
    apply_schema(&pool).await?;
    Ok(pool)
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    debug!("schema applied");
    Ok(())
}
