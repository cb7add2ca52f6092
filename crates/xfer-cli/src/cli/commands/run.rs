//! `xfer run` – the daemon: scheduler loop, supervisor and control socket.

use anyhow::{Context, Result};
use xfer_core::config::XferConfig;
use xfer_core::control::default_control_socket_path;
use xfer_core::job_db::JobDb;
use xfer_core::publisher::ProgressPublisher;
use xfer_core::scheduler::Scheduler;
use xfer_core::supervisor::Supervisor;

use crate::cli::control_socket;

pub async fn run_daemon(db: &JobDb, cfg: &XferConfig) -> Result<()> {
    let supervisor = Supervisor::new(db.clone(), cfg, ProgressPublisher::default())?;
    let scheduler = Scheduler::new(db.clone(), supervisor.clone(), cfg);

    let socket_path = default_control_socket_path()?;
    let listener = control_socket::spawn_control_listener(supervisor.clone(), &socket_path)?;
    tracing::debug!(path = %socket_path.display(), "control socket listening");

    let handle = scheduler.spawn();
    println!(
        "xfer daemon running (max {} parallel jobs); Ctrl-C to stop",
        cfg.max_parallel()
    );

    tokio::signal::ctrl_c()
        .await
        .context("wait for shutdown signal")?;
    tracing::info!("shutdown requested");

    handle.stop().await;
    listener.abort();
    let _ = std::fs::remove_file(&socket_path);

    let live = supervisor.live_count();
    if live > 0 {
        // Children are killed with their handles; the next start fails these jobs.
        tracing::warn!(live, "exiting with copy processes still running");
        println!("{live} running job(s) interrupted; they will be marked FAILED on next start");
    }
    Ok(())
}
