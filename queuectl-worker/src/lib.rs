//! Job execution for queuectl.
//!
//! A [`Worker`] repeatedly claims one job from the
//! [`JobQueueClient`](queuectl_job_queue::JobQueueClient), runs its command
//! through a [`CommandRunner`](queuectl_job_queue::CommandRunner) and reports
//! the outcome. A [`Reaper`] sweeps for jobs whose lease ran out because their
//! worker died. A [`WorkerPool`] runs several workers and one reaper together.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use queuectl_job_queue::JobQueueClient;
//! use queuectl_worker::{
//!     shutdown_signal, wait_for_shutdown_signal, PoolOptions, ShellCommandRunner, WorkerPool,
//! };
//!
//! async fn serve(queue: JobQueueClient) {
//!     let (tx, rx) = shutdown_signal();
//!     tokio::spawn(wait_for_shutdown_signal(tx));
//!
//!     let pool = WorkerPool::new(queue, Arc::new(ShellCommandRunner::new()), PoolOptions::default());
//!     let summary = pool.run(4, rx).await.expect("store stayed reachable");
//!     println!("{} jobs succeeded", summary.totals.succeeded);
//! }
//! ```

mod error;
mod pool;
mod reaper;
mod runner;
mod shutdown;
mod worker;

pub use error::WorkerError;
pub use pool::{PoolOptions, PoolSummary, WorkerPool};
pub use reaper::{Reaper, ReaperOptions, DEFAULT_REAPER_INTERVAL, DEFAULT_WORKER_STALE_AFTER};
pub use runner::ShellCommandRunner;
pub use shutdown::{shutdown_signal, wait_for_shutdown_signal};
pub use worker::{
    Worker, WorkerOptions, WorkerStats, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_POLL_INTERVAL,
    DEFAULT_STORE_RETRY_BUDGET,
};
