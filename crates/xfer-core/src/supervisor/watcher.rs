//! Exit watcher: settles a job's terminal status once its process is gone.

use std::time::Duration;

use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::Supervisor;
use crate::job_db::{unix_timestamp, JobId, JobStatus};
use crate::publisher::JobEvent;

/// How long the reader may keep draining stderr after the process has exited.
/// A helper left behind by the tool can hold the pipe open indefinitely.
const READER_DRAIN: Duration = Duration::from_secs(1);

pub(super) async fn watch_exit(
    sup: Supervisor,
    job_id: JobId,
    mut child: Child,
    mut reader: JoinHandle<()>,
    exited: CancellationToken,
) {
    let exit = child.wait().await;
    exited.cancel();
    // Every record the process wrote is published before its terminal event.
    match tokio::time::timeout(READER_DRAIN, &mut reader).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(job_id, "stderr reader task failed: {}", e),
        Err(_) => {
            tracing::debug!(job_id, "stderr still open after exit; stopping reader");
            reader.abort();
            let _ = reader.await;
        }
    }

    let success = match &exit {
        Ok(status) => {
            tracing::info!(job_id, code = ?status.code(), "copy tool exited");
            status.success()
        }
        Err(e) => {
            tracing::warn!(job_id, "wait for copy tool: {}", e);
            false
        }
    };

    let final_status = settle(&sup, job_id, success).await;

    sup.forget(job_id);
    sup.publisher().publish(JobEvent::terminal(job_id, final_status));
    sup.inner.materializer.remove(job_id).await;
}

/// Persist the derived terminal status unless the job was canceled.
/// Returns the status observers should see.
async fn settle(sup: &Supervisor, job_id: JobId, success: bool) -> JobStatus {
    let db = sup.db();
    match sup.retry_store(move || db.get_job(job_id)).await {
        Ok(Some(job)) if job.status == JobStatus::Canceled => return JobStatus::Canceled,
        // Removed by the operator while running; there is nothing left to settle.
        Ok(None) => return JobStatus::Canceled,
        Ok(Some(_)) => {}
        Err(e) => tracing::warn!(job_id, "re-read job after exit: {:#}", e),
    }

    let derived = if success {
        JobStatus::Completed
    } else {
        JobStatus::Failed
    };
    let now = unix_timestamp();
    let written = sup
        .retry_store(move || db.finish(job_id, JobStatus::Running, derived, now))
        .await;
    match written {
        Ok(true) => derived,
        Ok(false) => {
            // Someone else settled it first (a cancel landing after the re-read).
            match db.get_job(job_id).await {
                Ok(Some(job)) if job.status.is_terminal() => job.status,
                _ => derived,
            }
        }
        Err(e) => {
            tracing::error!(job_id, status = %derived, "status write failed: {:#}", e);
            derived
        }
    }
}
