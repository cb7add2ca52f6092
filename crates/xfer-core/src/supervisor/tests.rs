//! Supervisor tests against fake copy tools written as shell scripts.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio::sync::broadcast;

use super::*;
use crate::config::StoreRetryConfig;
use crate::job_db::{open_memory, NewJob, NewRemote, RemoteConfig, TransferOptions};
use crate::publisher::JobEvent;

const PROGRESS_1: &str = r#"{"level":"notice","msg":"Transferred: 10 B","stats":{"bytes":10,"totalBytes":100,"speed":5,"eta":null,"transfers":0,"totalTransfers":2}}"#;
const PROGRESS_2: &str = r#"{"level":"notice","msg":"Transferred: 100 B","stats":{"bytes":100,"totalBytes":250,"speed":50,"eta":0,"transfers":2,"totalTransfers":2}}"#;
const ERROR_LINE: &str = r#"{"level":"error","msg":"Failed to copy: AccessDenied"}"#;

struct Harness {
    dir: TempDir,
    db: JobDb,
    sup: Supervisor,
}

fn write_tool(dir: &Path, body: &str) -> String {
    let path = dir.join("fake-rclone");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

async fn harness_with_tool(tool: impl FnOnce(&Path) -> String, kill_grace_secs: u64) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db = open_memory().await.unwrap();
    for name in ["src", "dst"] {
        db.create_remote(&NewRemote {
            name: name.to_string(),
            kind: "source".to_string(),
            config: RemoteConfig {
                remote_type: "s3".into(),
                provider: "Minio".into(),
                access_key_id: "ak".into(),
                secret_access_key: "sk".into(),
                endpoint: "http://127.0.0.1:9000".into(),
            },
        })
        .await
        .unwrap();
    }
    let cfg = XferConfig {
        copy_tool: tool(dir.path()),
        kill_grace_secs,
        config_dir: Some(dir.path().join("configs")),
        store_retry: Some(StoreRetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }),
        ..XferConfig::default()
    };
    let sup = Supervisor::new(db.clone(), &cfg, ProgressPublisher::default()).unwrap();
    Harness { dir, db, sup }
}

async fn harness(script: &str, kill_grace_secs: u64) -> Harness {
    let script = script.to_string();
    harness_with_tool(move |dir| write_tool(dir, &script), kill_grace_secs).await
}

async fn new_job(db: &JobDb, source: &str) -> Job {
    db.create_job(&NewJob {
        name: "copy".into(),
        source_endpoint: source.into(),
        target_endpoint: "dst:archive".into(),
        options: TransferOptions::default(),
    })
    .await
    .unwrap()
}

/// Collect this job's events up to and including its terminal event.
async fn events_until_terminal(rx: &mut broadcast::Receiver<JobEvent>, job_id: JobId) -> Vec<JobEvent> {
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(15), async {
        loop {
            let ev = rx.recv().await.unwrap();
            if ev.job_id != job_id {
                continue;
            }
            let done = ev.status.is_terminal();
            seen.push(ev);
            if done {
                break;
            }
        }
    })
    .await
    .expect("terminal event");
    seen
}

async fn first_running_event(rx: &mut broadcast::Receiver<JobEvent>, job_id: JobId) {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let ev = rx.recv().await.unwrap();
            if ev.job_id == job_id && ev.status == JobStatus::Running {
                break;
            }
        }
    })
    .await
    .expect("progress event");
}

async fn wait_total_bytes(db: &JobDb, job_id: JobId) -> Option<u64> {
    for _ in 0..100 {
        let job = db.get_job(job_id).await.unwrap().unwrap();
        if job.total_bytes.is_some() {
            return job.total_bytes;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    None
}

#[tokio::test]
async fn successful_exit_completes_job() {
    let h = harness(
        &format!("echo '{PROGRESS_1}' >&2\necho 'not json' >&2\necho '{PROGRESS_2}' >&2\nexit 0"),
        5,
    )
    .await;
    let job = new_job(&h.db, "src:photos").await;
    let mut rx = h.sup.publisher().subscribe();

    let pid = h.sup.start(&job).await.unwrap();
    assert!(pid > 0);

    let events = events_until_terminal(&mut rx, job.id).await;
    let statuses: Vec<_> = events.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![JobStatus::Running, JobStatus::Running, JobStatus::Completed]
    );
    assert_eq!(events[0].data.as_ref().unwrap()["stats"]["bytes"], 10);
    assert!(events[2].data.is_none());

    let done = h.db.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.pid, None);
    assert!(done.ended_at.unwrap() >= done.started_at.unwrap());
    // Total comes from the first record only.
    assert_eq!(wait_total_bytes(&h.db, job.id).await, Some(100));

    assert!(!h.sup.is_live(job.id));
    assert!(!h.dir.path().join("configs").join(format!("rclone_{}.conf", job.id)).exists());
}

#[tokio::test]
async fn exit_settles_while_background_helper_holds_stderr() {
    // The backgrounded sleep inherits stderr and keeps it open past the exit.
    let h = harness(&format!("echo '{PROGRESS_1}' >&2\nsleep 4 &\nexit 0"), 5).await;
    let job = new_job(&h.db, "src:photos").await;
    let mut rx = h.sup.publisher().subscribe();

    let started = Instant::now();
    h.sup.start(&job).await.unwrap();
    let events = events_until_terminal(&mut rx, job.id).await;
    assert!(started.elapsed() < Duration::from_millis(3500));
    assert_eq!(events.first().unwrap().status, JobStatus::Running);
    assert_eq!(events.last().unwrap().status, JobStatus::Completed);

    assert_eq!(
        h.db.get_job(job.id).await.unwrap().unwrap().status,
        JobStatus::Completed
    );
    assert!(!h.sup.is_live(job.id));
}

#[tokio::test]
async fn nonzero_exit_fails_job_and_forwards_error_records() {
    let h = harness(&format!("echo '{ERROR_LINE}' >&2\nexit 3"), 5).await;
    let job = new_job(&h.db, "src:photos").await;
    let mut rx = h.sup.publisher().subscribe();

    h.sup.start(&job).await.unwrap();
    let events = events_until_terminal(&mut rx, job.id).await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].status, JobStatus::Running);
    assert_eq!(events[0].data.as_ref().unwrap()["level"], "error");
    assert_eq!(events[1].status, JobStatus::Failed);

    let failed = h.db.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.ended_at.is_some());
    assert_eq!(failed.total_bytes, None);
}

#[tokio::test]
async fn stop_running_job_ends_canceled() {
    let h = harness(
        &format!("echo '{PROGRESS_1}' >&2\nwhile :; do sleep 1 2>/dev/null; done"),
        5,
    )
    .await;
    let job = new_job(&h.db, "src:photos").await;
    let mut rx = h.sup.publisher().subscribe();

    let pid = h.sup.start(&job).await.unwrap();
    first_running_event(&mut rx, job.id).await;

    let outcome = h.sup.stop(job.id).await.unwrap();
    assert_eq!(outcome, StopOutcome::Terminating { pid });
    // CANCELED is persisted before the process is gone.
    assert_eq!(
        h.db.get_job(job.id).await.unwrap().unwrap().status,
        JobStatus::Canceled
    );

    let events = events_until_terminal(&mut rx, job.id).await;
    assert_eq!(events.last().unwrap().status, JobStatus::Canceled);
    let job = h.db.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Canceled);
    assert_eq!(job.pid, None);
    assert!(!h.sup.is_live(job.id));

    assert_eq!(
        h.sup.stop(job.id).await.unwrap(),
        StopOutcome::AlreadyFinished(JobStatus::Canceled)
    );
}

#[tokio::test]
async fn process_ignoring_sigterm_is_killed_after_grace() {
    let h = harness(
        &format!("trap '' TERM\necho '{PROGRESS_1}' >&2\nwhile :; do sleep 1 2>/dev/null; done"),
        1,
    )
    .await;
    let job = new_job(&h.db, "src:photos").await;
    let mut rx = h.sup.publisher().subscribe();

    h.sup.start(&job).await.unwrap();
    first_running_event(&mut rx, job.id).await;

    let stopped_at = Instant::now();
    assert!(matches!(
        h.sup.stop(job.id).await.unwrap(),
        StopOutcome::Terminating { .. }
    ));
    let events = events_until_terminal(&mut rx, job.id).await;
    assert!(stopped_at.elapsed() >= Duration::from_millis(900));
    assert_eq!(events.last().unwrap().status, JobStatus::Canceled);
    assert_eq!(
        h.db.get_job(job.id).await.unwrap().unwrap().status,
        JobStatus::Canceled
    );
}

#[tokio::test]
async fn missing_executable_fails_without_running() {
    let h = harness_with_tool(|dir| dir.join("no-such-tool").to_string_lossy().into_owned(), 5).await;
    let job = new_job(&h.db, "src:photos").await;
    let mut rx = h.sup.publisher().subscribe();

    let err = h.sup.start(&job).await.unwrap_err();
    assert!(matches!(err, StartError::Spawn { id, .. } if id == job.id));

    let failed = h.db.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.pid, None);
    assert_eq!(failed.started_at, None);
    assert!(failed.ended_at.is_some());
    assert!(!h.sup.is_live(job.id));
    assert_eq!(rx.recv().await.unwrap(), JobEvent::terminal(job.id, JobStatus::Failed));
}

#[tokio::test]
async fn unknown_remote_fails_without_running() {
    let h = harness("exit 0", 5).await;
    let job = new_job(&h.db, "ghost:bucket").await;

    assert!(matches!(
        h.sup.start(&job).await,
        Err(StartError::Spawn { .. })
    ));
    let failed = h.db.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.pid, None);
}

#[tokio::test]
async fn start_refuses_live_or_non_new_jobs() {
    let h = harness("while :; do sleep 1 2>/dev/null; done", 5).await;
    let job = new_job(&h.db, "src:photos").await;
    h.sup.start(&job).await.unwrap();

    assert!(matches!(
        h.sup.start(&job).await,
        Err(StartError::AlreadyRunning(id)) if id == job.id
    ));

    let running = h.db.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(running.status, JobStatus::Running);
    h.sup.forget(job.id);
    assert!(matches!(
        h.sup.start(&running).await,
        Err(StartError::NotStartable { status: JobStatus::Running, .. })
    ));

    // Forgotten handles cannot be signaled; stop writes the status and publishes it.
    let mut rx = h.sup.publisher().subscribe();
    assert_eq!(h.sup.stop(job.id).await.unwrap(), StopOutcome::Canceled);
    assert_eq!(
        rx.try_recv().unwrap(),
        JobEvent::terminal(job.id, JobStatus::Canceled)
    );
}

#[tokio::test]
async fn stop_does_not_signal_a_pid_whose_process_has_exited() {
    let h = harness("exit 0", 1).await;
    let job = new_job(&h.db, "src:photos").await;

    // Stands in for an unrelated process that reused the pid.
    let mut bystander = std::process::Command::new("sleep").arg("30").spawn().unwrap();
    let pid = bystander.id();
    assert!(h.db.mark_running(job.id, pid, unix_timestamp()).await.unwrap());
    let exited = CancellationToken::new();
    exited.cancel();
    h.sup.live().insert(job.id, LiveProcess { pid, exited });

    assert_eq!(h.sup.stop(job.id).await.unwrap(), StopOutcome::Canceled);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(bystander.try_wait().unwrap().is_none());
    assert_eq!(
        h.db.get_job(job.id).await.unwrap().unwrap().status,
        JobStatus::Canceled
    );

    bystander.kill().unwrap();
    bystander.wait().unwrap();
}

#[tokio::test]
async fn stop_new_and_missing_jobs() {
    let h = harness("exit 0", 5).await;
    let job = new_job(&h.db, "src:photos").await;
    let mut rx = h.sup.publisher().subscribe();

    assert_eq!(h.sup.stop(job.id).await.unwrap(), StopOutcome::Canceled);
    assert_eq!(
        rx.try_recv().unwrap(),
        JobEvent::terminal(job.id, JobStatus::Canceled)
    );
    let canceled = h.db.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(canceled.status, JobStatus::Canceled);
    assert!(canceled.ended_at.is_some());

    // A canceled job cannot be started afterwards.
    assert!(matches!(
        h.sup.start(&canceled).await,
        Err(StartError::NotStartable { .. })
    ));
    assert!(matches!(
        h.sup.stop(9999).await,
        Err(StopError::NotFound(9999))
    ));
}
