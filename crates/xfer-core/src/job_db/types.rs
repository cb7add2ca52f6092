//! Types used by the job database.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Job identifier.
pub type JobId = i64;

/// Remote identifier.
pub type RemoteId = i64;

/// Upper bound on `--transfers` accepted at job creation.
pub const MAX_TRANSFERS: u32 = 256;

/// Lifecycle status stored as a string in the database.
///
/// `New` is the single "not started" state; a legacy `QUEUED` value reads as `New`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    New,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::New => "NEW",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Canceled => "CANCELED",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "NEW" | "QUEUED" => JobStatus::New,
            "RUNNING" => JobStatus::Running,
            "COMPLETED" => JobStatus::Completed,
            "CANCELED" => JobStatus::Canceled,
            _ => JobStatus::Failed,
        }
    }

    /// COMPLETED, FAILED and CANCELED are final; nothing moves a job out of them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Canceled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Rejected transfer options.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("transfers must be at least 1")]
    ZeroTransfers,
    #[error("transfers must be at most {max}, got {got}")]
    TooManyTransfers { max: u32, got: u32 },
}

/// Copy-tool parameters for one job, stored as JSON in the DB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOptions {
    /// Number of parallel file transfers (`--transfers`).
    pub transfers: u32,
    /// Bandwidth cap in MiB/s (`--bwlimit <n>M`); 0 = unlimited.
    #[serde(default)]
    pub bandwidth_limit_mib: u32,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            transfers: 4,
            bandwidth_limit_mib: 0,
        }
    }
}

impl TransferOptions {
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.transfers == 0 {
            return Err(OptionsError::ZeroTransfers);
        }
        if self.transfers > MAX_TRANSFERS {
            return Err(OptionsError::TooManyTransfers {
                max: MAX_TRANSFERS,
                got: self.transfers,
            });
        }
        Ok(())
    }
}

/// Build an endpoint address `"<remote>:<bucket><path>"` as stored on a job.
///
/// A path without a leading `/` gets one so `bucket` and `path` never run together.
pub fn endpoint_address(remote_name: &str, bucket: &str, path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        format!("{remote_name}:{bucket}{path}")
    } else {
        format!("{remote_name}:{bucket}/{path}")
    }
}

/// Remote name part of an endpoint address (text before the first `:`).
pub fn endpoint_remote_name(endpoint: &str) -> &str {
    endpoint.split(':').next().unwrap_or(endpoint)
}

/// Fields required to insert a job whose endpoints are already resolved.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub name: String,
    pub source_endpoint: String,
    pub target_endpoint: String,
    pub options: TransferOptions,
}

/// One side of a job request, before remote names are resolved.
#[derive(Debug, Clone)]
pub struct EndpointRef {
    pub remote_id: RemoteId,
    pub bucket: String,
    pub path: String,
}

/// Job request as submitted by an operator: endpoints reference remotes by id.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub name: String,
    pub source: EndpointRef,
    pub target: EndpointRef,
    pub options: TransferOptions,
}

/// Full job record used by the scheduler and supervisor.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub status: JobStatus,
    pub source_endpoint: String,
    pub target_endpoint: String,
    pub options: TransferOptions,
    /// OS process id of the current run attempt.
    pub pid: Option<u32>,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    /// Total size reported by the first progress record of the run.
    pub total_bytes: Option<u64>,
    pub created_at: i64,
}

/// Credentials and addressing for one named storage endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Backend type understood by the copy tool (e.g. `s3`).
    pub remote_type: String,
    /// Backend provider (e.g. `Minio`, `AWS`, `Ceph`).
    pub provider: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: String,
}

/// Remote as stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub id: RemoteId,
    pub name: String,
    /// Operator grouping such as `source` or `target`.
    pub kind: String,
    pub config: RemoteConfig,
}

/// Fields for creating or replacing a remote.
#[derive(Debug, Clone)]
pub struct NewRemote {
    pub name: String,
    pub kind: String,
    pub config: RemoteConfig,
}
