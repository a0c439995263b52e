//! Job lifecycle engine for queuectl.
//!
//! Jobs are shell commands identified by a caller-chosen id. They move through
//! `pending → processing → completed`, or on failure back to `pending` with
//! exponential backoff until their retry budget runs out and they land in the
//! dead letter queue (`dead`). All coordination between workers happens through
//! conditional writes in the SQLite store; nothing is shared in memory.
//!
//! # Architecture
//!
//! - [`JobQueueClient`] - enqueue, claim, report and reclaim jobs; query the queue
//! - [`RetryPolicy`] - the pure retry/dead-letter decision
//! - [`QueueSettings`] - `max_retries`, `backoff_base`, `worker_timeout`
//! - [`CommandRunner`] - trait for whatever actually runs a job's command
//! - [`Clock`] - time source, swappable for [`ManualClock`] in tests
//!
//! # Example
//!
//! ```rust,no_run
//! use queuectl_db::{DbConnectionConfig, JobStore};
//! use queuectl_job_queue::{FailureReason, JobQueueClient, JobSpec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = JobStore::open(&DbConnectionConfig::for_path("/tmp/jobs.db")).await?;
//!     let queue = JobQueueClient::new(store);
//!
//!     queue.enqueue(JobSpec::new("backup", "tar czf /tmp/b.tgz /etc")).await?;
//!
//!     if let Some(job) = queue.claim("worker-1").await? {
//!         // ... run job.command ...
//!         queue
//!             .report_failure(&job, "worker-1", FailureReason::NonZeroExit(2))
//!             .await?;
//!     }
//!     Ok(())
//! }
//! ```

mod client;
mod clock;
mod error;
mod executor;
mod retry;
mod settings;
mod types;

pub use client::{JobQueueClient, DEFAULT_CLAIM_WINDOW};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::JobQueueError;
pub use executor::{CommandError, CommandRunner, NoOpRunner};
pub use retry::{RetryDecision, RetryPolicy};
pub use settings::{
    QueueSettings, SettingKey, DEFAULT_BACKOFF_BASE, DEFAULT_MAX_RETRIES,
    DEFAULT_WORKER_TIMEOUT_SECS,
};
pub use types::{
    FailureReason, Job, JobFilter, JobSpec, QueueStats, ReapReport, WorkerInfo,
    DEFAULT_LIST_LIMIT,
};

pub use queuectl_db::JobState;

// Re-export async_trait for convenience when implementing CommandRunner
pub use async_trait::async_trait;
