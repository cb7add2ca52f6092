//! Job read operations: get, list, scheduler queries.

use anyhow::Result;
use sqlx::Row;

use super::super::db::JobDb;
use super::super::types::{Job, JobId};
use super::{job_from_row, JOB_COLUMNS};

impl JobDb {
    /// Fetch a single job.
    pub async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    /// List all jobs, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY id DESC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(job_from_row).collect()
    }

    /// Jobs that occupy a scheduler slot (status RUNNING), oldest first.
    pub async fn active_jobs(&self) -> Result<Vec<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE status = 'RUNNING' ORDER BY id ASC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(job_from_row).collect()
    }

    /// The oldest job that has not started yet (FIFO by id), if any.
    pub async fn next_new_job(&self) -> Result<Option<Job>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status IN ('NEW', 'QUEUED') ORDER BY id ASC LIMIT 1"
        );
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(job_from_row).transpose()
    }

    /// Number of non-terminal jobs whose source or target uses the named remote.
    pub async fn count_live_jobs_using_remote(&self, remote_name: &str) -> Result<i64> {
        let prefix = format!("{remote_name}:%");
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM jobs
            WHERE status IN ('NEW', 'QUEUED', 'RUNNING')
              AND (source_endpoint LIKE ?1 ESCAPE '\' OR target_endpoint LIKE ?1 ESCAPE '\')
            "#,
        )
        .bind(escape_like(&prefix))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("n"))
    }
}

/// Escape LIKE wildcards in everything but a trailing `%`.
fn escape_like(pattern: &str) -> String {
    let (body, tail) = match pattern.strip_suffix('%') {
        Some(body) => (body, "%"),
        None => (pattern, ""),
    };
    let mut out = String::with_capacity(pattern.len() + 4);
    for c in body.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push_str(tail);
    out
}
