use thiserror::Error;

/// Anything a command can fail with. Printed as `Error: <message>`.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] queuectl_config::ConfigError),
    #[error("failed to open job store: {0}")]
    Store(#[from] queuectl_db::StoreError),
    #[error(transparent)]
    Queue(#[from] queuectl_job_queue::JobQueueError),
    #[error(transparent)]
    Worker(#[from] queuectl_worker::WorkerError),
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}
