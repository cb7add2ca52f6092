pub mod config;
pub mod logging;

pub mod control;
pub mod job_db;
pub mod materialize;
pub mod progress;
pub mod publisher;
pub mod retry;
pub mod scheduler;
pub mod supervisor;
