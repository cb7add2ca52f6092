//! Copy-tool progress output (bytes done, total, rate, ETA).
//!
//! The copy tool writes one JSON log record per stderr line when run with
//! `--use-json-log`. Records that carry a `stats` object are periodic progress
//! snapshots; records at level `error` describe transfer problems. Anything else
//! (including lines that are not JSON) is ignored by the supervisor.

use serde::{Deserialize, Serialize};

/// Snapshot of transfer progress for one job, as reported by the copy tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStats {
    /// Bytes transferred so far.
    pub bytes: u64,
    /// Total bytes the tool expects to transfer (may grow while listing).
    pub total_bytes: u64,
    /// Current rate in bytes per second.
    #[serde(default)]
    pub speed: f64,
    /// Estimated seconds remaining; null until the tool can estimate.
    #[serde(default)]
    pub eta: Option<f64>,
    #[serde(default)]
    pub transfers: u64,
    #[serde(default)]
    pub total_transfers: u64,
    #[serde(default)]
    pub errors: u64,
    #[serde(default)]
    pub checks: u64,
    /// Seconds since the tool started.
    #[serde(default)]
    pub elapsed_time: f64,
}

impl TransferStats {
    /// Average rate over the whole run in bytes per second (0 if no time has elapsed).
    pub fn average_bytes_per_sec(&self) -> f64 {
        if self.elapsed_time <= 0.0 {
            return 0.0;
        }
        self.bytes as f64 / self.elapsed_time
    }

    /// Estimated seconds remaining: the tool's own estimate if present, else
    /// derived from the average rate. None if nothing has moved yet.
    pub fn eta_secs(&self) -> Option<f64> {
        if let Some(eta) = self.eta {
            return Some(eta);
        }
        let remaining = self.total_bytes.saturating_sub(self.bytes);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.average_bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        (self.bytes as f64 / self.total_bytes as f64).min(1.0)
    }
}

/// One structured log record. Unknown fields are kept in the raw value
/// that accompanies it in [`ParsedLine`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogRecord {
    pub level: String,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub stats: Option<TransferStats>,
}

/// Classified stderr line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// Non-error record with a `stats` object.
    Progress {
        stats: TransferStats,
        raw: serde_json::Value,
    },
    /// Record at level `error`.
    Error {
        record: LogRecord,
        raw: serde_json::Value,
    },
}

impl ParsedLine {
    /// The record exactly as the tool wrote it, for forwarding to observers.
    pub fn raw(&self) -> &serde_json::Value {
        match self {
            ParsedLine::Progress { raw, .. } | ParsedLine::Error { raw, .. } => raw,
        }
    }
}

/// Parse one stderr line. Returns None for anything that is neither a progress
/// record nor an error record.
pub fn parse_line(line: &str) -> Option<ParsedLine> {
    let line = line.trim();
    if !line.starts_with('{') {
        return None;
    }
    let raw: serde_json::Value = serde_json::from_str(line).ok()?;
    let record: LogRecord = serde_json::from_value(raw.clone()).ok()?;

    if record.level.eq_ignore_ascii_case("error") {
        return Some(ParsedLine::Error { record, raw });
    }
    let stats = record.stats?;
    Some(ParsedLine::Progress { stats, raw })
}
