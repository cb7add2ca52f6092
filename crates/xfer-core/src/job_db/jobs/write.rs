//! Job write operations: create, lifecycle transitions, options, remove.
//!
//! Lifecycle writes are conditional updates (`WHERE status = <from>`) and report
//! whether they applied, so concurrent writers (exit watcher, stop request,
//! orphan sweep) settle on exactly one outcome.

use anyhow::{Context, Result};

use super::super::db::{unix_timestamp, JobDb};
use super::super::types::{
    endpoint_address, Job, JobId, JobRequest, JobStatus, NewJob, TransferOptions,
};
use super::{job_from_row, JOB_COLUMNS};

impl JobDb {
    /// Insert a new job in status NEW. Options are validated first.
    pub async fn create_job(&self, job: &NewJob) -> Result<Job> {
        job.options.validate()?;
        let now = unix_timestamp();
        let options_json = serde_json::to_string(&job.options)?;

        let id = sqlx::query(
            r#"
            INSERT INTO jobs (
                name, status, source_endpoint, target_endpoint, options_json,
                pid, started_at, ended_at, total_bytes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5,
                      NULL, NULL, NULL, NULL, ?6, ?7)
            "#,
        )
        .bind(&job.name)
        .bind(JobStatus::New.as_str())
        .bind(&job.source_endpoint)
        .bind(&job.target_endpoint)
        .bind(options_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get_job(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("job {} vanished after insert", id))
    }

    /// Resolve the request's remote ids to names, build both endpoint addresses
    /// and insert the job. Endpoints are fixed from here on.
    pub async fn submit_job(&self, req: &JobRequest) -> Result<Job> {
        let source = self
            .get_remote(req.source.remote_id)
            .await?
            .with_context(|| format!("source remote {} not found", req.source.remote_id))?;
        let target = self
            .get_remote(req.target.remote_id)
            .await?
            .with_context(|| format!("target remote {} not found", req.target.remote_id))?;

        let new_job = NewJob {
            name: req.name.clone(),
            source_endpoint: endpoint_address(&source.name, &req.source.bucket, &req.source.path),
            target_endpoint: endpoint_address(&target.name, &req.target.bucket, &req.target.path),
            options: req.options,
        };
        self.create_job(&new_job).await
    }

    /// NEW → RUNNING for a freshly spawned process: records pid and start time
    /// in one write. Returns false if the job was no longer NEW.
    pub async fn mark_running(&self, id: JobId, pid: u32, started_at: i64) -> Result<bool> {
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'RUNNING',
                pid = ?1,
                started_at = ?2,
                ended_at = NULL,
                updated_at = ?3
            WHERE id = ?4 AND status IN ('NEW', 'QUEUED')
            "#,
        )
        .bind(i64::from(pid))
        .bind(started_at)
        .bind(unix_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() == 1)
    }

    /// Move a job from `from` to the terminal status `to`, stamping `ended_at`
    /// and clearing `pid`. Returns false if the job was not in `from`.
    pub async fn finish(
        &self,
        id: JobId,
        from: JobStatus,
        to: JobStatus,
        ended_at: i64,
    ) -> Result<bool> {
        anyhow::ensure!(to.is_terminal(), "finish target {} is not terminal", to);
        // A legacy QUEUED row counts as NEW.
        let sql = r#"
            UPDATE jobs
            SET status = ?1,
                ended_at = ?2,
                pid = NULL,
                updated_at = ?3
            WHERE id = ?4
              AND (status = ?5 OR (?5 = 'NEW' AND status = 'QUEUED'))
            "#;
        let r = sqlx::query(sql)
            .bind(to.as_str())
            .bind(ended_at)
            .bind(unix_timestamp())
            .bind(id)
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected() == 1)
    }

    /// Cancel a job that has not reached a terminal status.
    /// Returns the status it was canceled from, or None if it was already terminal
    /// (or does not exist).
    pub async fn cancel_job(&self, id: JobId, ended_at: i64) -> Result<Option<JobStatus>> {
        if self.finish(id, JobStatus::New, JobStatus::Canceled, ended_at).await? {
            return Ok(Some(JobStatus::New));
        }
        // The job may have been promoted between the two writes; this catches it.
        if self.finish(id, JobStatus::Running, JobStatus::Canceled, ended_at).await? {
            return Ok(Some(JobStatus::Running));
        }
        Ok(None)
    }

    /// Record the total size discovered from the first progress record.
    /// Only the first write per run attempt applies.
    pub async fn set_total_bytes_once(&self, id: JobId, total_bytes: u64) -> Result<bool> {
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET total_bytes = ?1,
                updated_at = ?2
            WHERE id = ?3 AND total_bytes IS NULL
            "#,
        )
        .bind(i64::try_from(total_bytes).unwrap_or(i64::MAX))
        .bind(unix_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() == 1)
    }

    /// Replace the transfer options of a job that has not started.
    /// Returns the updated job, or None if the job is missing or no longer NEW.
    pub async fn update_options(&self, id: JobId, options: &TransferOptions) -> Result<Option<Job>> {
        options.validate()?;
        let sql = format!(
            r#"
            UPDATE jobs
            SET options_json = ?1,
                updated_at = ?2
            WHERE id = ?3 AND status IN ('NEW', 'QUEUED')
            RETURNING {JOB_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(serde_json::to_string(options)?)
            .bind(unix_timestamp())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    /// Permanently remove a job row. Callers cancel non-terminal jobs first.
    pub async fn remove_job(&self, id: JobId) -> Result<bool> {
        let r = sqlx::query("DELETE FROM jobs WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected() == 1)
    }
}
