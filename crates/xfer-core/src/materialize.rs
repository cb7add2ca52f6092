//! Per-job copy-tool config files.
//!
//! Before a job is spawned, the credentials of its source and target remotes
//! are rendered into an INI file that the tool reads via `--config`. The file
//! lives at `<config_dir>/rclone_<job id>.conf`, is readable by the owner only,
//! and is deleted by the exit watcher once the process is gone.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::job_db::{endpoint_remote_name, Job, JobDb, JobId, Remote};

#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("remote {0:?} referenced by job is not registered")]
    UnknownRemote(String),
    #[error("job store: {0:#}")]
    Store(anyhow::Error),
    #[error("write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn render_section(out: &mut String, remote: &Remote) {
    let c = &remote.config;
    let _ = writeln!(out, "[{}]", remote.name);
    let _ = writeln!(out, "type = {}", c.remote_type);
    let _ = writeln!(out, "provider = {}", c.provider);
    let _ = writeln!(out, "access_key_id = {}", c.access_key_id);
    let _ = writeln!(out, "secret_access_key = {}", c.secret_access_key);
    let _ = writeln!(out, "endpoint = {}", c.endpoint);
}

/// Render the config for a source/target pair. One section per distinct remote.
pub fn render(source: &Remote, target: &Remote) -> String {
    let mut out = String::new();
    render_section(&mut out, source);
    if target.name != source.name {
        out.push('\n');
        render_section(&mut out, target);
    }
    out
}

/// Writes and removes per-job config files under one directory.
#[derive(Clone)]
pub struct ConfigMaterializer {
    db: JobDb,
    config_dir: PathBuf,
}

impl ConfigMaterializer {
    pub fn new(db: JobDb, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self, job_id: JobId) -> PathBuf {
        self.config_dir.join(format!("rclone_{}.conf", job_id))
    }

    async fn lookup(&self, endpoint: &str) -> Result<Remote, MaterializeError> {
        let name = endpoint_remote_name(endpoint);
        self.db
            .get_remote_by_name(name)
            .await
            .map_err(MaterializeError::Store)?
            .ok_or_else(|| MaterializeError::UnknownRemote(name.to_string()))
    }

    /// Resolve the job's remotes and write its config file. Returns the path.
    pub async fn materialize(&self, job: &Job) -> Result<PathBuf, MaterializeError> {
        let source = self.lookup(&job.source_endpoint).await?;
        let target = self.lookup(&job.target_endpoint).await?;
        let body = render(&source, &target);

        let path = self.config_path(job.id);
        let io_err = |source| MaterializeError::Io {
            path: path.clone(),
            source,
        };
        tokio::fs::create_dir_all(&self.config_dir)
            .await
            .map_err(io_err)?;

        let mut opts = tokio::fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        opts.mode(0o600);
        let mut file = opts.open(&path).await.map_err(io_err)?;
        // A file left over from an earlier run keeps its old mode; tighten it.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(io_err)?;
        }
        file.write_all(body.as_bytes()).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;

        tracing::debug!(job_id = job.id, path = %path.display(), "materialized tool config");
        Ok(path)
    }

    /// Delete the job's config file. Missing files are fine.
    pub async fn remove(&self, job_id: JobId) {
        let path = self.config_path(job_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(job_id, path = %path.display(), "remove tool config: {}", e)
            }
        }
    }
}
