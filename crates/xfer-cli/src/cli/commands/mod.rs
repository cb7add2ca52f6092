//! CLI command handlers, grouped by the object they act on.

mod completions;
mod job;
mod remote;
mod run;
mod stop;
mod watch;

pub use completions::run_completions;
pub use job::{run_job_add, run_job_edit, run_job_list, run_job_show};
pub use remote::run_remote;
pub use run::run_daemon;
pub use stop::{run_job_remove, run_job_stop};
pub use watch::run_watch;
