//! `xfer watch` – print live job events from the daemon.

use anyhow::Result;
use xfer_core::control::default_control_socket_path;
use xfer_core::progress::TransferStats;
use xfer_core::publisher::JobEvent;

use crate::cli::control_socket;

const MIB: f64 = 1024.0 * 1024.0;

/// Streams events until the daemon goes away. With `json`, lines are passed
/// through unchanged; otherwise each event is summarized on one line.
pub async fn run_watch(json: bool) -> Result<()> {
    let socket_path = default_control_socket_path()?;
    let Some(mut lines) = control_socket::open_watch(&socket_path).await? else {
        anyhow::bail!("no xfer daemon is running (start one with `xfer run`)");
    };
    while let Some(line) = lines.next_line().await? {
        if json {
            println!("{line}");
            continue;
        }
        match serde_json::from_str::<JobEvent>(&line) {
            Ok(event) => println!("{}", format_event(&event)),
            Err(e) => {
                tracing::debug!("unparsable event line: {}", e);
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn format_eta(secs: Option<f64>) -> String {
    let Some(secs) = secs else {
        return "-".to_string();
    };
    let secs = secs.max(0.0).round() as u64;
    format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

fn format_event(event: &JobEvent) -> String {
    let prefix = format!("job {:<5} {:<9}", event.job_id, event.status);
    let Some(data) = &event.data else {
        return prefix.trim_end().to_string();
    };

    if let Some(stats) = data
        .get("stats")
        .and_then(|s| serde_json::from_value::<TransferStats>(s.clone()).ok())
    {
        return format!(
            "{prefix} {:5.1}%  {:.1}/{:.1} MiB  {:.2} MiB/s  eta {}  files {}/{}",
            stats.fraction() * 100.0,
            stats.bytes as f64 / MIB,
            stats.total_bytes as f64 / MIB,
            stats.speed / MIB,
            format_eta(stats.eta_secs()),
            stats.transfers,
            stats.total_transfers,
        );
    }

    let level = data.get("level").and_then(|v| v.as_str()).unwrap_or("info");
    let msg = data.get("msg").and_then(|v| v.as_str()).unwrap_or("");
    format!("{prefix} [{level}] {msg}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use xfer_core::job_db::JobStatus;

    #[test]
    fn progress_event_shows_fraction_rate_and_eta() {
        let ev = JobEvent::running(
            3,
            json!({
                "level": "notice",
                "msg": "Transferred",
                "stats": {
                    "bytes": 1048576,
                    "totalBytes": 4194304,
                    "speed": 524288.0,
                    "eta": null,
                    "transfers": 1,
                    "totalTransfers": 4,
                    "elapsedTime": 2.0
                }
            }),
        );
        let line = format_event(&ev);
        assert!(line.starts_with("job 3"), "{line}");
        assert!(line.contains("RUNNING"), "{line}");
        assert!(line.contains(" 25.0%"), "{line}");
        assert!(line.contains("1.0/4.0 MiB"), "{line}");
        assert!(line.contains("0.50 MiB/s"), "{line}");
        // No estimate from the tool: 3 MiB left at the 0.5 MiB/s average.
        assert!(line.contains("eta 0:00:06"), "{line}");
        assert!(line.contains("files 1/4"), "{line}");
    }

    #[test]
    fn error_record_shows_its_message() {
        let ev = JobEvent::running(
            9,
            json!({"level": "error", "msg": "Failed to copy: AccessDenied"}),
        );
        let line = format_event(&ev);
        assert!(line.ends_with("[error] Failed to copy: AccessDenied"), "{line}");
    }

    #[test]
    fn terminal_event_is_just_the_status() {
        let line = format_event(&JobEvent::terminal(12, JobStatus::Canceled));
        assert_eq!(line, "job 12    CANCELED");
    }

    #[test]
    fn eta_formatting() {
        assert_eq!(format_eta(None), "-");
        assert_eq!(format_eta(Some(3725.4)), "1:02:05");
    }
}
