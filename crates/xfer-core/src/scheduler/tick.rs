use std::collections::HashSet;

use super::{Scheduler, TickReport};
use crate::job_db::{unix_timestamp, JobStatus};
use crate::publisher::JobEvent;
use crate::supervisor::StartError;

impl Scheduler {
    /// One scheduling pass: reconcile orphans, then fill free slots FIFO.
    pub async fn tick(&self) -> anyhow::Result<TickReport> {
        let Ok(_guard) = self.tick_guard.try_lock() else {
            tracing::debug!("previous tick still running, skipping");
            return Ok(TickReport {
                skipped: true,
                ..TickReport::default()
            });
        };
        let mut report = TickReport::default();

        let mut running = 0usize;
        for job in self.db.active_jobs().await? {
            if self.supervisor.is_live(job.id) {
                running += 1;
                continue;
            }
            // Only applies if the job is still RUNNING; an exit watcher may have won.
            if self
                .db
                .finish(job.id, JobStatus::Running, JobStatus::Failed, unix_timestamp())
                .await?
            {
                tracing::warn!(job_id = job.id, pid = ?job.pid, "no live process for RUNNING job, marked FAILED");
                self.supervisor
                    .publisher()
                    .publish(JobEvent::terminal(job.id, JobStatus::Failed));
                report.reconciled.push(job.id);
            }
        }

        let mut attempted = HashSet::new();
        while running < self.max_parallel {
            let Some(job) = self.db.next_new_job().await? else {
                break;
            };
            if !attempted.insert(job.id) {
                // Still NEW after an attempt this tick; leave it for the next one.
                break;
            }
            match self.supervisor.start(&job).await {
                Ok(pid) => {
                    tracing::info!(job_id = job.id, pid, running = running + 1, "job started");
                    running += 1;
                    report.started.push(job.id);
                }
                Err(StartError::Spawn { id, reason }) => {
                    tracing::warn!(job_id = id, "job failed to start: {}", reason);
                    report.failed_to_start.push(id);
                }
                Err(StartError::NotStartable { id, status }) => {
                    tracing::debug!(job_id = id, %status, "job no longer NEW, skipping");
                }
                Err(e @ StartError::AlreadyRunning(_)) => {
                    tracing::warn!("{}", e);
                    break;
                }
                Err(StartError::Store(e)) => return Err(e),
            }
        }

        Ok(report)
    }
}
