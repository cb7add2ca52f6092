//! CLI for the xfer data-migration manager.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use xfer_core::config;
use xfer_core::job_db::JobDb;
use xfer_core::logging;

use commands::{
    run_completions, run_daemon, run_job_add, run_job_edit, run_job_list, run_job_remove,
    run_job_show, run_job_stop, run_remote, run_watch,
};

/// Top-level CLI for xfer.
#[derive(Debug, Parser)]
#[command(name = "xfer")]
#[command(about = "xfer: bucket-to-bucket copy jobs run by an rclone supervisor", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Manage named storage remotes.
    Remote {
        #[command(subcommand)]
        command: RemoteCommand,
    },

    /// Manage copy jobs.
    Job {
        #[command(subcommand)]
        command: JobCommand,
    },

    /// Run the daemon: scheduler loop, process supervisor and control socket.
    Run,

    /// Print live job events from a running daemon.
    Watch {
        /// Print the raw JSON event lines instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Print shell completions to stdout.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// Credentials and addressing of a remote. Required for `add`, optional for `update`.
#[derive(Debug, Clone, Default, Args)]
pub struct RemoteFields {
    /// Backend type passed to the copy tool (e.g. s3).
    #[arg(long = "type", value_name = "TYPE")]
    pub remote_type: Option<String>,
    /// Backend provider (e.g. Minio, AWS, Ceph).
    #[arg(long)]
    pub provider: Option<String>,
    #[arg(long)]
    pub access_key_id: Option<String>,
    #[arg(long)]
    pub secret_access_key: Option<String>,
    /// Service endpoint URL.
    #[arg(long)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum RemoteCommand {
    /// Register a remote.
    Add {
        /// Remote name; used as the prefix of endpoint addresses.
        name: String,
        /// Operator grouping (source or target).
        #[arg(long, default_value = "source")]
        kind: String,
        #[command(flatten)]
        fields: RemoteFields,
    },

    /// List remotes.
    List {
        /// Only remotes of this kind.
        #[arg(long)]
        kind: Option<String>,
    },

    /// Change a remote. Omitted fields keep their current value.
    Update {
        /// Remote identifier.
        id: i64,
        /// New name (refused while unfinished jobs use the remote).
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        kind: Option<String>,
        #[command(flatten)]
        fields: RemoteFields,
    },

    /// Delete a remote (refused while unfinished jobs use it).
    Remove {
        /// Remote identifier.
        id: i64,
    },
}

/// One side of a copy job.
#[derive(Debug, Clone, Args)]
pub struct JobEndpoints {
    /// Source remote id.
    #[arg(long, value_name = "ID")]
    pub source_remote: i64,
    #[arg(long)]
    pub source_bucket: String,
    /// Path inside the source bucket.
    #[arg(long, default_value = "")]
    pub source_path: String,
    /// Target remote id.
    #[arg(long, value_name = "ID")]
    pub target_remote: i64,
    #[arg(long)]
    pub target_bucket: String,
    /// Path inside the target bucket.
    #[arg(long, default_value = "")]
    pub target_path: String,
}

#[derive(Debug, Subcommand)]
pub enum JobCommand {
    /// Create a copy job. It starts once the daemon has a free slot.
    Add {
        /// Job name.
        name: String,
        #[command(flatten)]
        endpoints: JobEndpoints,
        /// Parallel file transfers.
        #[arg(long, default_value = "4", value_name = "N")]
        transfers: u32,
        /// Bandwidth limit in MiB/s (0 = unlimited).
        #[arg(long, default_value = "0", value_name = "MIB")]
        bwlimit: u32,
    },

    /// Change the options of a job that has not started yet.
    Edit {
        /// Job identifier.
        id: i64,
        #[arg(long, value_name = "N")]
        transfers: Option<u32>,
        #[arg(long, value_name = "MIB")]
        bwlimit: Option<u32>,
    },

    /// List all jobs.
    List,

    /// Show one job.
    Show {
        /// Job identifier.
        id: i64,
    },

    /// Stop a job: cancel it and terminate its copy process.
    Stop {
        /// Job identifier.
        id: i64,
    },

    /// Delete a job, stopping it first if it has not finished.
    Remove {
        /// Job identifier.
        id: i64,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        if let CliCommand::Completions { shell } = cli.command {
            run_completions(shell);
            return Ok(());
        }

        let daemon = matches!(cli.command, CliCommand::Run);
        logging::init(daemon);

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        if let CliCommand::Watch { json } = cli.command {
            return run_watch(json).await;
        }

        let db = JobDb::open_default().await?;
        match cli.command {
            CliCommand::Remote { command } => run_remote(&db, command).await?,
            CliCommand::Job { command } => match command {
                JobCommand::Add {
                    name,
                    endpoints,
                    transfers,
                    bwlimit,
                } => run_job_add(&db, name, endpoints, transfers, bwlimit).await?,
                JobCommand::Edit {
                    id,
                    transfers,
                    bwlimit,
                } => run_job_edit(&db, id, transfers, bwlimit).await?,
                JobCommand::List => run_job_list(&db).await?,
                JobCommand::Show { id } => run_job_show(&db, id).await?,
                JobCommand::Stop { id } => run_job_stop(&db, id).await?,
                JobCommand::Remove { id } => run_job_remove(&db, id).await?,
            },
            CliCommand::Run => run_daemon(&db, &cfg).await?,
            CliCommand::Watch { .. } | CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
