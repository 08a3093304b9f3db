//! Periodic tick scheduler for Diffduel.
//!
//! One global ticker drives every started room's timer: each period it posts
//! a tick message into the gateway's command channel. The gateway applies
//! the timer update for all rooms on receipt.
//!
//! # Overrun behavior
//!
//! A tick must fire on schedule even when the gateway is backlogged, but a
//! late tick is *skipped*, never compounded — no catch-up bursts that would
//! make game clocks jump. Two mechanisms enforce this:
//!
//! - [`tokio::time::MissedTickBehavior::Skip`] on the interval, so a stalled
//!   ticker task resumes on the next period boundary instead of replaying
//!   missed periods;
//! - `try_send` into the bounded command channel, so a full gateway queue
//!   drops the tick rather than queueing a burst behind the backlog.
//!
//! The ticker is cancellable through its [`TickerHandle`] and idles happily
//! when no room is started — deciding what a tick *means* is the receiver's
//! job.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Ticker settings.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. Default: 1 second (game timers are in seconds).
    pub period: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self { period: Duration::from_secs(1) }
    }
}

impl TickConfig {
    /// Config with a specific period.
    pub fn with_period(period: Duration) -> Self {
        Self { period }
    }
}

// ---------------------------------------------------------------------------
// Stats / handle
// ---------------------------------------------------------------------------

/// Counters reported by a stopped ticker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Ticks delivered into the channel.
    pub ticks_sent: u64,
    /// Ticks dropped because the receiver was backlogged.
    pub ticks_skipped: u64,
}

/// Handle to a running ticker task. Dropping the handle leaves the ticker
/// running; call [`stop`](Self::stop) to cancel it.
pub struct TickerHandle {
    shutdown: watch::Sender<bool>,
    task: tokio::task::JoinHandle<TickStats>,
}

impl TickerHandle {
    /// Cancels the ticker and returns its final counters.
    pub async fn stop(self) -> TickStats {
        let _ = self.shutdown.send(true);
        self.task.await.unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Spawns the ticker task: every `config.period`, a clone of `tick` is
/// posted into `tx`.
///
/// The task ends when it is stopped through the handle or when the
/// receiving side of `tx` is dropped.
pub fn spawn<T>(
    config: TickConfig,
    tx: mpsc::Sender<T>,
    tick: T,
) -> TickerHandle
where
    T: Clone + Send + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    debug!(period_ms = config.period.as_millis() as u64, "ticker started");

    let task = tokio::spawn(async move {
        let mut stats = TickStats::default();
        // First tick fires one full period after start, not immediately.
        let mut interval =
            time::interval_at(time::Instant::now() + config.period, config.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    debug!("ticker stopped");
                    break;
                }
                _ = interval.tick() => {
                    match tx.try_send(tick.clone()) {
                        Ok(()) => stats.ticks_sent += 1,
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            stats.ticks_skipped += 1;
                            warn!(
                                skipped = stats.ticks_skipped,
                                "receiver backlogged — tick skipped"
                            );
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            debug!("tick receiver gone — ticker exiting");
                            break;
                        }
                    }
                }
            }
        }

        stats
    });

    TickerHandle { shutdown: shutdown_tx, task }
}
