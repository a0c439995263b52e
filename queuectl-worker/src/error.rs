//! Worker errors.

use queuectl_job_queue::JobQueueError;
use thiserror::Error;

/// Conditions that stop a worker, reaper or pool.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("job store unavailable after {attempts} consecutive attempts: {source}")]
    StoreUnavailable {
        attempts: u32,
        #[source]
        source: JobQueueError,
    },

    #[error(transparent)]
    Queue(#[from] JobQueueError),

    #[error("worker task failed: {0}")]
    Task(String),
}
