//! Operator stop: cancel in the store, then terminate the process.

use super::signal::{self, Signal};
use super::{StopError, StopOutcome, Supervisor};
use crate::job_db::{unix_timestamp, JobId, JobStatus};
use crate::publisher::JobEvent;

impl Supervisor {
    /// Cancel a job. The CANCELED write happens before any signal, so the exit
    /// watcher always sees it and never reports FAILED for a stopped job.
    pub async fn stop(&self, job_id: JobId) -> Result<StopOutcome, StopError> {
        let db = self.db();
        let now = unix_timestamp();
        let prior = self
            .retry_store(move || db.cancel_job(job_id, now))
            .await
            .map_err(|e| {
                tracing::error!(job_id, status = "CANCELED", "status write failed: {:#}", e);
                StopError::Store(e)
            })?;

        match prior {
            Some(JobStatus::Running) => {}
            Some(_) => {
                tracing::info!(job_id, "canceled before start");
                self.publisher()
                    .publish(JobEvent::terminal(job_id, JobStatus::Canceled));
                return Ok(StopOutcome::Canceled);
            }
            None => {
                return match db.get_job(job_id).await.map_err(StopError::Store)? {
                    Some(job) => Ok(StopOutcome::AlreadyFinished(job.status)),
                    None => Err(StopError::NotFound(job_id)),
                };
            }
        }

        // No watcher will publish for a job without a handle.
        let Some(live) = self.live_process(job_id) else {
            tracing::info!(job_id, "canceled running job with no live process");
            self.publisher()
                .publish(JobEvent::terminal(job_id, JobStatus::Canceled));
            return Ok(StopOutcome::Canceled);
        };

        let pid = live.pid;
        // The pid may already be reaped and reused; the watcher settles the job.
        if live.exited.is_cancelled() {
            tracing::info!(job_id, pid, "process already exited, not signaling");
            return Ok(StopOutcome::Canceled);
        }
        if let Err(e) = signal::send(pid, Signal::Terminate) {
            tracing::warn!(job_id, pid, "SIGTERM: {}", e);
        } else {
            tracing::info!(job_id, pid, "sent SIGTERM");
        }

        let grace = self.inner.kill_grace;
        tokio::spawn(async move {
            tokio::select! {
                _ = live.exited.cancelled() => {}
                _ = tokio::time::sleep(grace) => {
                    if live.exited.is_cancelled() {
                        return;
                    }
                    tracing::warn!(job_id, pid, ?grace, "still running after grace period, sending SIGKILL");
                    if let Err(e) = signal::send(pid, Signal::Kill) {
                        tracing::warn!(job_id, pid, "SIGKILL: {}", e);
                    }
                }
            }
        });

        Ok(StopOutcome::Terminating { pid })
    }
}
