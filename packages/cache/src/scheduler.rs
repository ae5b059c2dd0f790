//! Timers driving the refresh orchestrator.
//!
//! The scheduler runs the bootstrap, then interleaves two independent
//! triggers: the periodic interval and at most one pending retry deadline
//! requested by the last failed cycle. Cycles run as tasks in a `JoinSet`
//! so a slow upstream never delays the timers; overlapping triggers are
//! resolved by the orchestrator's single-flight guard.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

use crate::{CycleOutcome, RefreshOrchestrator};

/// Handle on a running scheduler.
#[derive(Debug)]
pub struct Scheduler {
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    /// Spawns the scheduler loop. The bootstrap starts immediately; the
    /// first periodic refresh fires one interval later.
    #[must_use]
    pub fn start(orchestrator: Arc<RefreshOrchestrator>) -> Self {
        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(run(orchestrator, Arc::clone(&shutdown)));
        Self { shutdown, handle }
    }

    /// Stops the timers, aborts any cycle in flight and waits for the loop
    /// to exit.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.handle.await {
            log::error!("Scheduler task failed: {e}");
        }
    }
}

async fn run(orchestrator: Arc<RefreshOrchestrator>, shutdown: Arc<Notify>) {
    let period = orchestrator.config().interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut cycles = JoinSet::new();
    let mut retry_at: Option<Instant> = None;

    log::info!("Scheduler started: refresh every {}s", period.as_secs());
    cycles.spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.bootstrap().await }
    });

    loop {
        tokio::select! {
            () = shutdown.notified() => break,
            _ = ticker.tick() => {
                log::info!("Periodic refresh triggered");
                spawn_cycle(&mut cycles, &orchestrator);
            }
            () = retry_due(retry_at) => {
                retry_at = None;
                log::info!("Retry refresh triggered");
                spawn_cycle(&mut cycles, &orchestrator);
            }
            Some(joined) = cycles.join_next() => match joined {
                Ok(outcome) => {
                    log_outcome(&outcome);
                    if let Some(delay) = outcome.retry_delay() {
                        retry_at = Some(Instant::now() + delay);
                    }
                }
                Err(e) => log::error!("Refresh cycle task failed: {e}"),
            },
        }
    }

    cycles.shutdown().await;
    log::info!("Scheduler stopped");
}

fn spawn_cycle(cycles: &mut JoinSet<CycleOutcome>, orchestrator: &Arc<RefreshOrchestrator>) {
    let orchestrator = Arc::clone(orchestrator);
    cycles.spawn(async move { orchestrator.run_cycle().await });
}

async fn retry_due(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn log_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Committed { records } => {
            log::info!("Refresh committed {records} records");
        }
        CycleOutcome::Degraded { reason, retry } => {
            log::warn!("Refresh degraded ({reason}), retry: {retry:?}");
        }
        CycleOutcome::Skipped => log::debug!("Refresh skipped"),
    }
}
