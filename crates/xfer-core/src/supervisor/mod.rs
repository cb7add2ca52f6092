//! Process supervisor: one copy-tool process per running job.
//!
//! `start` spawns the tool and hands its stderr to a reader task and the child
//! to an exit watcher. `stop` cancels in the store first and then terminates the
//! process, escalating to SIGKILL after the grace period. The live-handle map is
//! the only shared mutable state; inserts happen in `start`, removals in the exit
//! watcher (and in `forget` for handles the scheduler finds stale).

mod command;
mod reader;
mod signal;
mod stop;
mod watcher;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::XferConfig;
use crate::job_db::{unix_timestamp, Job, JobDb, JobId, JobStatus};
use crate::materialize::ConfigMaterializer;
use crate::publisher::ProgressPublisher;
use crate::retry::{run_with_retry, RetryPolicy};

/// Handle kept for a spawned process until its exit watcher finishes.
#[derive(Debug, Clone)]
pub struct LiveProcess {
    pub pid: u32,
    /// Cancelled by the exit watcher as soon as the process has exited.
    pub exited: CancellationToken,
}

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("job {0} already has a running process")]
    AlreadyRunning(JobId),
    #[error("job {id} is {status}, only NEW jobs can start")]
    NotStartable { id: JobId, status: JobStatus },
    #[error("job {id}: failed to start copy tool: {reason}")]
    Spawn { id: JobId, reason: String },
    #[error("job store: {0:#}")]
    Store(anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum StopError {
    #[error("job {0} not found")]
    NotFound(JobId),
    #[error("job store: {0:#}")]
    Store(anyhow::Error),
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Marked CANCELED; there was no process to terminate.
    Canceled,
    /// Marked CANCELED and SIGTERM sent; SIGKILL follows if it outlives the grace period.
    Terminating { pid: u32 },
    /// Already in a terminal status; nothing written.
    AlreadyFinished(JobStatus),
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopOutcome::Canceled => f.write_str("canceled"),
            StopOutcome::Terminating { pid } => write!(f, "canceled, terminating pid {}", pid),
            StopOutcome::AlreadyFinished(status) => write!(f, "already {}", status),
        }
    }
}

struct Inner {
    db: JobDb,
    materializer: ConfigMaterializer,
    publisher: ProgressPublisher,
    copy_tool: String,
    stats_interval_secs: u64,
    kill_grace: Duration,
    store_retry: RetryPolicy,
    live: Mutex<HashMap<JobId, LiveProcess>>,
}

/// Cheap to clone; clones share the live-handle map.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(db: JobDb, cfg: &XferConfig, publisher: ProgressPublisher) -> anyhow::Result<Self> {
        let materializer = ConfigMaterializer::new(db.clone(), cfg.resolved_config_dir()?);
        Ok(Self {
            inner: Arc::new(Inner {
                db,
                materializer,
                publisher,
                copy_tool: cfg.copy_tool.clone(),
                stats_interval_secs: cfg.stats_interval_secs,
                kill_grace: cfg.kill_grace(),
                store_retry: cfg.store_retry_policy(),
                live: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn db(&self) -> &JobDb {
        &self.inner.db
    }

    pub fn publisher(&self) -> &ProgressPublisher {
        &self.inner.publisher
    }

    fn live(&self) -> MutexGuard<'_, HashMap<JobId, LiveProcess>> {
        self.inner.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_live(&self, job_id: JobId) -> bool {
        self.live().contains_key(&job_id)
    }

    pub fn live_process(&self, job_id: JobId) -> Option<LiveProcess> {
        self.live().get(&job_id).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.live().len()
    }

    /// Drop a handle without touching the process. Used for stale entries.
    pub fn forget(&self, job_id: JobId) -> bool {
        self.live().remove(&job_id).is_some()
    }

    /// Run a store operation under the configured retry policy.
    async fn retry_store<T, F, Fut>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        run_with_retry(&self.inner.store_retry, f).await
    }

    /// Spawn the copy tool for a NEW job and move it to RUNNING.
    ///
    /// Returns the child's pid. If the config cannot be written or the tool cannot
    /// be spawned, the job goes straight from NEW to FAILED and `Spawn` is returned.
    pub async fn start(&self, job: &Job) -> Result<u32, StartError> {
        let id = job.id;
        if self.is_live(id) {
            return Err(StartError::AlreadyRunning(id));
        }
        if job.status != JobStatus::New {
            return Err(StartError::NotStartable {
                id,
                status: job.status,
            });
        }

        let config_path = match self.inner.materializer.materialize(job).await {
            Ok(p) => p,
            Err(e) => return Err(self.fail_unstarted(id, e.to_string()).await),
        };

        let args = command::copy_args(job, &config_path, self.inner.stats_interval_secs);
        let mut cmd = command::copy_command(&self.inner.copy_tool, args);
        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                self.inner.materializer.remove(id).await;
                let reason = format!("spawn {}: {}", self.inner.copy_tool, e);
                return Err(self.fail_unstarted(id, reason).await);
            }
        };
        let (Some(pid), Some(stderr)) = (child.id(), child.stderr.take()) else {
            let _ = child.start_kill();
            self.inner.materializer.remove(id).await;
            return Err(self
                .fail_unstarted(id, "child has no pid or stderr pipe".to_string())
                .await);
        };

        let exited = CancellationToken::new();
        self.live().insert(
            id,
            LiveProcess {
                pid,
                exited: exited.clone(),
            },
        );

        let started_at = unix_timestamp();
        let db = &self.inner.db;
        let promoted = self
            .retry_store(move || db.mark_running(id, pid, started_at))
            .await;
        match promoted {
            Ok(true) => {}
            Ok(false) => {
                // Canceled (or removed) between selection and spawn.
                let _ = child.start_kill();
                self.forget(id);
                self.inner.materializer.remove(id).await;
                let status = match self.inner.db.get_job(id).await {
                    Ok(Some(j)) => j.status,
                    _ => JobStatus::Canceled,
                };
                tracing::info!(job_id = id, pid, %status, "job left NEW before start; killed child");
                return Err(StartError::NotStartable { id, status });
            }
            Err(e) => {
                tracing::error!(job_id = id, pid, status = "RUNNING", "status write failed: {:#}", e);
                let _ = child.start_kill();
                self.forget(id);
                self.inner.materializer.remove(id).await;
                return Err(StartError::Store(e));
            }
        }

        tracing::info!(
            job_id = id,
            pid,
            source = %job.source_endpoint,
            target = %job.target_endpoint,
            "copy tool started"
        );

        let reader = tokio::spawn(reader::read_progress(
            stderr,
            id,
            self.inner.db.clone(),
            self.inner.publisher.clone(),
        ));
        tokio::spawn(watcher::watch_exit(self.clone(), id, child, reader, exited));
        Ok(pid)
    }

    /// NEW → FAILED for a job whose process never started.
    async fn fail_unstarted(&self, id: JobId, reason: String) -> StartError {
        tracing::warn!(job_id = id, "failed to start job: {}", reason);
        let db = &self.inner.db;
        let now = unix_timestamp();
        let written = self
            .retry_store(move || db.finish(id, JobStatus::New, JobStatus::Failed, now))
            .await;
        match written {
            Ok(true) => self
                .inner
                .publisher
                .publish(crate::publisher::JobEvent::terminal(id, JobStatus::Failed)),
            Ok(false) => {}
            Err(e) => {
                tracing::error!(job_id = id, status = "FAILED", "status write failed: {:#}", e)
            }
        }
        StartError::Spawn { id, reason }
    }
}

#[cfg(test)]
mod tests;
