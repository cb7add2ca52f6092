//! `xfer job stop <id>` and `xfer job remove <id>`.
//!
//! With a daemon running, the stop goes over the control socket so the copy
//! process is terminated. Without one there is no process to signal and the
//! job is canceled directly in the store.

use anyhow::{Context, Result};
use xfer_core::control::{default_control_socket_path, ControlReply};
use xfer_core::job_db::{unix_timestamp, JobDb, JobId};

use crate::cli::control_socket;

async fn stop_job(db: &JobDb, id: JobId) -> Result<String> {
    let socket_path = default_control_socket_path()?;
    match control_socket::send_stop(&socket_path, id).await? {
        Some(ControlReply::Ok(outcome)) => Ok(outcome),
        Some(ControlReply::Err(msg)) => anyhow::bail!("daemon: {msg}"),
        None => {
            tracing::debug!(job_id = id, "no daemon listening; canceling in store");
            let job = db
                .get_job(id)
                .await?
                .with_context(|| format!("job {id} not found"))?;
            match db.cancel_job(id, unix_timestamp()).await? {
                Some(_) => Ok("canceled".to_string()),
                None => Ok(format!("already {}", job.status)),
            }
        }
    }
}

pub async fn run_job_stop(db: &JobDb, id: JobId) -> Result<()> {
    let outcome = stop_job(db, id).await?;
    println!("Job {id}: {outcome}");
    Ok(())
}

pub async fn run_job_remove(db: &JobDb, id: JobId) -> Result<()> {
    let job = db
        .get_job(id)
        .await?
        .with_context(|| format!("job {id} not found"))?;
    if !job.status.is_terminal() {
        let outcome = stop_job(db, id).await?;
        tracing::debug!(job_id = id, %outcome, "stopped before removal");
    }
    db.remove_job(id).await?;
    println!("Removed job {id}");
    Ok(())
}
