//! Logging init: daemon log file under the XDG state dir, stderr for everything else.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,xfer=debug";

/// Where log output ends up after [`init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    File(PathBuf),
    Stderr,
}

/// Shared append handle; each event gets a cloned fd, or stderr if cloning fails.
struct SharedLogFile(Arc<fs::File>);

enum LogWriter {
    File(fs::File),
    Stderr(io::Stderr),
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogWriter::File(f) => f.write(buf),
            LogWriter::Stderr(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogWriter::File(f) => f.flush(),
            LogWriter::Stderr(e) => e.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for SharedLogFile {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        match self.0.try_clone() {
            Ok(f) => LogWriter::File(f),
            Err(_) => LogWriter::Stderr(io::stderr()),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Path of the daemon log: `~/.local/state/xfer/xfer.log`.
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("xfer")?;
    Ok(xdg_dirs.get_state_home().join("xfer").join("xfer.log"))
}

fn open_log_file() -> Result<(fs::File, PathBuf)> {
    let path = log_file_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create log dir: {}", dir.display()))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file: {}", path.display()))?;
    Ok((file, path))
}

/// Install the global subscriber.
///
/// With `to_file` the daemon logs to the XDG state file and falls back to stderr if the
/// file cannot be opened; short-lived CLI commands pass `false` and log to stderr.
pub fn init(to_file: bool) -> LogSink {
    let opened = if to_file { open_log_file().ok() } else { None };

    match opened {
        Some((file, path)) => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(SharedLogFile(Arc::new(file)))
                .with_ansi(false)
                .init();
            tracing::info!("xfer logging initialized at {}", path.display());
            LogSink::File(path)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(io::stderr)
                .with_ansi(false)
                .init();
            LogSink::Stderr
        }
    }
}
