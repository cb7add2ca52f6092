//! Scheduler loop: promotes NEW jobs to RUNNING up to `max_parallel`.
//!
//! Each tick first fails RUNNING jobs that have no live process in this daemon
//! (orphans left by a crash or restart), then starts the oldest NEW jobs until
//! capacity is reached. Ticks run on one task; a tick that finds another still
//! in progress is skipped.

mod tick;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::XferConfig;
use crate::job_db::{JobDb, JobId};
use crate::supervisor::Supervisor;

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Orphaned RUNNING jobs moved to FAILED.
    pub reconciled: Vec<JobId>,
    /// Jobs whose process was spawned this tick.
    pub started: Vec<JobId>,
    /// Jobs that failed to spawn and are now FAILED.
    pub failed_to_start: Vec<JobId>,
    /// True if another tick was still running and this one did nothing.
    pub skipped: bool,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.reconciled.is_empty() && self.started.is_empty() && self.failed_to_start.is_empty()
    }
}

#[derive(Clone)]
pub struct Scheduler {
    db: JobDb,
    supervisor: Supervisor,
    max_parallel: usize,
    poll_interval: Duration,
    tick_guard: Arc<tokio::sync::Mutex<()>>,
}

impl Scheduler {
    pub fn new(db: JobDb, supervisor: Supervisor, cfg: &XferConfig) -> Self {
        Self {
            db,
            supervisor,
            max_parallel: cfg.max_parallel(),
            poll_interval: cfg.poll_interval(),
            tick_guard: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Run the loop on its own task: one tick immediately, then one per poll interval.
    pub fn spawn(&self) -> SchedulerHandle {
        let token = CancellationToken::new();
        let stop = token.clone();
        let scheduler = self.clone();
        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(
                max_parallel = scheduler.max_parallel,
                poll_interval = ?scheduler.poll_interval,
                "scheduler started"
            );
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = interval.tick() => {
                        match scheduler.tick().await {
                            Ok(report) if !report.is_idle() => {
                                tracing::debug!(?report, "scheduler tick");
                            }
                            Ok(_) => {}
                            Err(e) => tracing::error!("scheduler tick failed: {:#}", e),
                        }
                    }
                }
            }
            tracing::info!("scheduler stopped");
        });
        SchedulerHandle { token, join }
    }
}

/// Running scheduler loop.
pub struct SchedulerHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop ticking and wait for the loop to exit. A tick already in progress
    /// finishes first. Running processes are left alone.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.join.await {
            tracing::warn!("scheduler task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
