//! Copy-tool invocation.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::job_db::Job;

/// Arguments after the executable:
/// `copy <source> <target> --config <path> --transfers <n> --bwlimit <m>M
/// --use-json-log --stats-log-level NOTICE --stats <s>s`.
///
/// A bandwidth limit of 0 is passed as `0M`, which the tool treats as unlimited.
pub(super) fn copy_args(job: &Job, config_path: &Path, stats_interval_secs: u64) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "copy".into(),
        job.source_endpoint.as_str().into(),
        job.target_endpoint.as_str().into(),
        "--config".into(),
        config_path.as_os_str().to_owned(),
    ];
    args.push("--transfers".into());
    args.push(job.options.transfers.to_string().into());
    args.push("--bwlimit".into());
    args.push(format!("{}M", job.options.bandwidth_limit_mib).into());
    args.push("--use-json-log".into());
    args.push("--stats-log-level".into());
    args.push("NOTICE".into());
    args.push("--stats".into());
    args.push(format!("{}s", stats_interval_secs.max(1)).into());
    args
}

/// Command with stdin closed, stdout discarded and stderr piped for the reader.
/// The child is killed if its handle is dropped (daemon shutdown).
pub(super) fn copy_command(tool: &str, args: Vec<OsString>) -> Command {
    let mut cmd = Command::new(tool);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}
