//! Retry and backoff for job-store writes.
//!
//! A lost status write leaves the durable record out of step with the
//! supervisor's live-handle map, so writes on the job lifecycle path go
//! through [`run_with_retry`]: transient SQLite failures (busy/locked
//! database, pool timeouts, I/O) are retried with capped exponential backoff.

mod classify;
mod policy;
mod run;

pub use classify::classify;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
