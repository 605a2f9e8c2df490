/// Periodic background refresh of a session's view.
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::{GridSession, PollOutcome};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Shortest accepted poll period; tokio intervals reject zero.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Counters collected by a running scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub applied: u64,
    pub suspended: u64,
    pub stale: u64,
    pub failed: u64,
}

impl SyncStats {
    fn record(&mut self, outcome: PollOutcome) {
        match outcome {
            PollOutcome::Applied => self.applied += 1,
            PollOutcome::Suspended => self.suspended += 1,
            PollOutcome::Stale => self.stale += 1,
            PollOutcome::Failed => self.failed += 1,
        }
    }
}

pub struct SyncScheduler {
    session: Arc<GridSession>,
    interval: Duration,
}

impl SyncScheduler {
    pub fn new(session: Arc<GridSession>) -> Self {
        Self::with_interval(session, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(session: Arc<GridSession>, interval: Duration) -> Self {
        Self {
            session,
            interval: interval.max(MIN_POLL_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One tick. Network failures are logged and reported as `Failed`.
    pub async fn poll_once(&self) -> PollOutcome {
        match self.session.poll().await {
            Ok(outcome) => {
                if outcome != PollOutcome::Applied {
                    debug!("poll of {}: {:?}", self.session.calendar(), outcome);
                }
                outcome
            }
            Err(e) => {
                warn!("polling {} failed: {}", self.session.calendar(), e);
                PollOutcome::Failed
            }
        }
    }

    /// Runs the loop on the tokio runtime. The first poll happens
    /// immediately.
    pub fn spawn(self) -> SyncHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let (applied_tx, applied_rx) = watch::channel(0u64);

        let task = tokio::spawn(async move {
            info!(
                "syncing {} every {:?}",
                self.session.calendar(),
                self.interval
            );
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut stats = SyncStats::default();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let outcome = self.poll_once().await;
                        stats.record(outcome);
                        if outcome == PollOutcome::Applied {
                            applied_tx.send_modify(|n| *n += 1);
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }

            debug!("sync loop for {} stopped: {:?}", self.session.calendar(), stats);
            stats
        });

        SyncHandle {
            shutdown: Some(shutdown_tx),
            applied: applied_rx,
            task,
        }
    }
}

pub struct SyncHandle {
    shutdown: Option<oneshot::Sender<()>>,
    applied: watch::Receiver<u64>,
    task: JoinHandle<SyncStats>,
}

impl SyncHandle {
    /// Receiver that changes each time a poll replaced the view.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.applied.clone()
    }

    pub async fn stop(mut self) -> SyncStats {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        match (&mut self.task).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("sync task ended abnormally: {}", e);
                SyncStats::default()
            }
        }
    }
}
