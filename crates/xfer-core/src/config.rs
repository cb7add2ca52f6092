use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry policy for job-store status writes (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRetryConfig {
    /// Maximum number of attempts per write (including the first).
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for StoreRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
        }
    }
}

/// Global configuration loaded from `~/.config/xfer/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XferConfig {
    /// Maximum number of jobs in RUNNING at once.
    pub max_parallel: usize,
    /// Seconds between scheduler ticks.
    pub poll_interval_secs: u64,
    /// Seconds between SIGTERM and SIGKILL when a running job is stopped.
    pub kill_grace_secs: u64,
    /// Copy tool executable (looked up on PATH unless absolute).
    pub copy_tool: String,
    /// Seconds between progress records emitted by the copy tool.
    pub stats_interval_secs: u64,
    /// Directory for per-job tool config files. Defaults to `~/.local/state/xfer/configs`.
    #[serde(default)]
    pub config_dir: Option<PathBuf>,
    /// Optional retry policy for status writes; if missing, built-in defaults are used.
    #[serde(default)]
    pub store_retry: Option<StoreRetryConfig>,
}

impl Default for XferConfig {
    fn default() -> Self {
        Self {
            max_parallel: 5,
            poll_interval_secs: 3,
            kill_grace_secs: 5,
            copy_tool: "rclone".to_string(),
            stats_interval_secs: 1,
            config_dir: None,
            store_retry: None,
        }
    }
}

impl XferConfig {
    /// Concurrency cap; zero would never start anything, so it counts as one.
    pub fn max_parallel(&self) -> usize {
        self.max_parallel.max(1)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_secs)
    }

    /// Directory where tool config files are materialized.
    pub fn resolved_config_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.config_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("xfer")?;
        Ok(xdg_dirs.get_state_home().join("xfer").join("configs"))
    }

    pub fn store_retry_policy(&self) -> RetryPolicy {
        self.store_retry
            .as_ref()
            .map(|r| RetryPolicy {
                max_attempts: r.max_attempts.max(1),
                base_delay: Duration::from_millis(r.base_delay_ms),
                max_delay: Duration::from_millis(r.max_delay_ms),
            })
            .unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("xfer")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<XferConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = XferConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: XferConfig = toml::from_str(&data)?;
    Ok(cfg)
}
