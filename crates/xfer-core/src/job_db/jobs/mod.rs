//! Job CRUD on `JobDb`, split into reads and lifecycle writes.

mod read;
mod write;

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::types::{Job, JobStatus, TransferOptions};

pub(super) const JOB_COLUMNS: &str = "id, name, status, source_endpoint, target_endpoint, \
     options_json, pid, started_at, ended_at, total_bytes, created_at";

/// Decode one `jobs` row selected with `JOB_COLUMNS`.
pub(super) fn job_from_row(row: &SqliteRow) -> Result<Job> {
    let status: String = row.get("status");
    let options_json: String = row.get("options_json");
    let options: TransferOptions = serde_json::from_str(&options_json)?;
    let pid: Option<i64> = row.get("pid");
    let total_bytes: Option<i64> = row.get("total_bytes");

    Ok(Job {
        id: row.get("id"),
        name: row.get("name"),
        status: JobStatus::from_str(&status),
        source_endpoint: row.get("source_endpoint"),
        target_endpoint: row.get("target_endpoint"),
        options,
        pid: pid.map(|p| p as u32),
        started_at: row.get("started_at"),
        ended_at: row.get("ended_at"),
        total_bytes: total_bytes.map(|b| b.max(0) as u64),
        created_at: row.get("created_at"),
    })
}
