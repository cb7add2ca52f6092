//! Persistent job store and remote registry (SQLite via sqlx).
//!
//! Stores job records (status, endpoints, transfer options, run timestamps,
//! process id, discovered total size) and the named remotes jobs copy between.
//! Every status write is conditional on the current status so terminal
//! statuses never regress.

mod db;
mod jobs;
mod remotes;
pub mod types;

pub use db::{unix_timestamp, JobDb};
pub use types::*;

#[cfg(test)]
pub(crate) use db::open_memory;
