//! Structured-output reader: turns the tool's stderr into job events.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::ChildStderr;

use crate::job_db::{JobDb, JobId};
use crate::progress::{parse_line, ParsedLine};
use crate::publisher::{JobEvent, ProgressPublisher};

/// Read stderr until EOF. Progress and error records are published as RUNNING
/// events in the order they were written; everything else is dropped.
///
/// The first progress record's total size is persisted on a detached task so a
/// slow store never holds up publishing.
pub(super) async fn read_progress(
    stderr: ChildStderr,
    job_id: JobId,
    db: JobDb,
    publisher: ProgressPublisher,
) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    let mut total_recorded = false;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(job_id, "stderr read ended: {}", e);
                break;
            }
        }
        let line = String::from_utf8_lossy(&buf);
        let Some(parsed) = parse_line(&line) else {
            continue;
        };

        match &parsed {
            ParsedLine::Progress { stats, .. } => {
                if !total_recorded {
                    total_recorded = true;
                    let db = db.clone();
                    let total = stats.total_bytes;
                    tokio::spawn(async move {
                        if let Err(e) = db.set_total_bytes_once(job_id, total).await {
                            tracing::warn!(job_id, total, "persist total bytes: {:#}", e);
                        }
                    });
                }
            }
            ParsedLine::Error { record, .. } => {
                tracing::warn!(
                    job_id,
                    msg = record.msg.as_deref().unwrap_or(""),
                    "copy tool reported an error"
                );
            }
        }
        publisher.publish(JobEvent::running(job_id, parsed.raw().clone()));
    }
}
