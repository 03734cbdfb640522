//! Straylight service binary.
//!
//! `start` wires storage, the bridge session, the webhook server, and the
//! queue worker together; `clear-session` is the operator recovery path
//! after a forced logout.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use straylight::config::Config;
use straylight::notify::{OrderNotifier, QueueWorker};
use straylight::session::bridge::spawn_event_listener;
use straylight::session::{
    BridgeClient, ConnectionManager, FlushDebouncer, SessionBackup, SessionTransport,
};
use straylight::store::{CredentialStore, NotificationQueue, StatusStore};
use straylight::{commerce::CommerceClient, logging, store, webhook};

/// Buffer size for the bridge event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How often expired queue entries are purged.
const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Parser)]
#[command(name = "straylight", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the notifier service (default).
    Start {
        /// Directory for rotated JSON log files.
        #[arg(long, default_value = "logs")]
        logs_dir: PathBuf,
    },
    /// Delete persisted session credentials so the next start re-links
    /// through a fresh QR challenge.
    ClearSession,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Start {
        logs_dir: PathBuf::from("logs"),
    }) {
        Command::Start { logs_dir } => run_service(&logs_dir).await,
        Command::ClearSession => clear_session().await,
    }
}

/// Full service startup. Any error here aborts the process — running
/// half-initialized is worse than not running.
async fn run_service(logs_dir: &Path) -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let _guard = logging::init_service(logs_dir, &config.service.log_level)
        .context("failed to initialise logging")?;

    info!(version = env!("CARGO_PKG_VERSION"), "straylight starting");
    if config.webhook.secret.is_none() {
        warn!("no webhook secret configured — accepting unsigned webhooks");
    }

    let store_id = config
        .commerce
        .store_id
        .clone()
        .context("commerce.store_id must be configured")?;
    let access_token = config
        .commerce
        .access_token
        .clone()
        .context("commerce.access_token must be configured")?;

    let pool = store::open(Path::new(&config.service.database_path))
        .await
        .context("failed to open database")?;

    let credentials = CredentialStore::new(pool.clone());
    let queue = NotificationQueue::new(pool.clone());
    let status = StatusStore::new(pool.clone());

    // Session plumbing: restore persisted credentials into the bridge, then
    // connect. Events flow through one channel into the state machine.
    let bridge = Arc::new(BridgeClient::new(config.bridge.base_url.clone()));
    let backup = Arc::new(SessionBackup::new(Arc::clone(&bridge), credentials));

    match backup.restore().await {
        Ok(true) => info!("session credentials restored"),
        Ok(false) => {}
        // Reported, not retried: the session will go through a fresh QR
        // challenge if the bridge has no material of its own.
        Err(e) => error!(error = %e, "session restore failed, starting without it"),
    }

    let debouncer = FlushDebouncer::spawn(backup, config.service.debounce_interval());
    let manager = ConnectionManager::new(
        Arc::clone(&bridge) as Arc<dyn SessionTransport>,
        status,
        debouncer,
        config.service.reconnect_delay(),
    );

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    spawn_event_listener(bridge.base_url().to_owned(), event_tx);
    tokio::spawn(Arc::clone(&manager).run(event_rx));

    bridge
        .connect()
        .await
        .context("failed to establish initial session")?;

    // Retention is bounded housekeeping, independent of processing.
    let retention_days = config.service.retention_days;
    let purge_queue = queue.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = purge_queue.purge_expired(retention_days).await {
                warn!(error = %e, "queue purge failed");
            }
        }
    });

    let notifier = OrderNotifier::new(
        CommerceClient::new(
            config.commerce.base_url().to_owned(),
            store_id,
            access_token,
        ),
        Arc::clone(&manager),
        config.event_templates(),
    );
    // The worker gates itself on session readiness; ingestion and retention
    // must keep running through a QR scan, so nothing else waits on it.
    let worker = QueueWorker::new(
        queue.clone(),
        Arc::clone(&manager),
        Arc::new(notifier),
        config.service.poll_interval(),
    );
    tokio::spawn(worker.run());

    let state = Arc::new(webhook::WebhookState {
        queue,
        secret: config.webhook.secret.clone(),
    });
    let listener = tokio::net::TcpListener::bind(&config.webhook.bind_addr)
        .await
        .with_context(|| format!("failed to bind webhook server on {}", config.webhook.bind_addr))?;
    info!(addr = %config.webhook.bind_addr, "webhook server listening");

    tokio::select! {
        result = axum::serve(listener, webhook::router(state)) => {
            result.context("webhook server error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
    }

    info!("straylight shut down cleanly");
    Ok(())
}

/// Operator recovery after a forced logout: wipe persisted credentials.
async fn clear_session() -> Result<()> {
    logging::init_cli();
    let config = Config::load().context("failed to load configuration")?;
    let pool = store::open(Path::new(&config.service.database_path))
        .await
        .context("failed to open database")?;
    let deleted = CredentialStore::new(pool).clear().await?;
    info!(deleted, "session cleared; next start will show a QR challenge");
    Ok(())
}
