//! Debounced flush scheduling.
//!
//! The session protocol emits many credential mutations in quick succession
//! during a handshake. Persisting on each one would multiply storage writes
//! for no benefit — only the settled state matters for restart recovery —
//! so mutations arm a quiet-period timer and the flush runs once, a fixed
//! interval after the last mutation in the burst.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

/// Something that can be flushed after a quiet period.
#[async_trait]
pub trait FlushTarget: Send + Sync + 'static {
    /// Perform the flush. Must not return an error — steady-state failures
    /// are logged inside, a flush is always best-effort.
    async fn flush(&self);
}

/// Channel capacity for change signals. Signals carry no data; a full
/// channel just means a re-arm is already queued.
const SIGNAL_CAPACITY: usize = 64;

/// Coalesces bursts of change notifications into one flush per quiet period.
///
/// Owns the only cancelable timer in the system: each
/// [`notify_changed`](FlushDebouncer::notify_changed) cancels the pending
/// flush and re-arms it `quiet_period` from now.
#[derive(Debug)]
pub struct FlushDebouncer {
    tx: mpsc::Sender<()>,
}

impl FlushDebouncer {
    /// Spawn the debounce task for `target` with the given quiet period.
    pub fn spawn(target: Arc<dyn FlushTarget>, quiet_period: Duration) -> Self {
        let (tx, mut rx) = mpsc::channel::<()>(SIGNAL_CAPACITY);
        tokio::spawn(async move {
            // Outer loop waits disarmed; inner loop re-arms until the quiet
            // period passes with no further signals.
            while rx.recv().await.is_some() {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(quiet_period) => {
                            trace!("quiet period elapsed, flushing");
                            target.flush().await;
                            break;
                        }
                        more = rx.recv() => {
                            if more.is_none() {
                                // Handle dropped mid-burst: exit without flushing.
                                return;
                            }
                            trace!("flush re-armed");
                        }
                    }
                }
            }
            trace!("debounce task stopped");
        });
        Self { tx }
    }

    /// Signal that the underlying material changed.
    ///
    /// Callable repeatedly and concurrently; never blocks. Each call pushes
    /// the pending flush out to one quiet period from now.
    pub fn notify_changed(&self) {
        // A full channel already carries an unconsumed re-arm signal.
        let _ = self.tx.try_send(());
    }
}
