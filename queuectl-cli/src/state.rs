use queuectl_config::Config;
use queuectl_job_queue::JobQueueClient;

use crate::config_helpers::database_config_from_config;
use crate::error::CliError;

/// Everything a command needs: the resolved configuration and a queue client.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Config,
    pub queue: JobQueueClient,
}

impl AppState {
    /// Open (creating and migrating if needed) the store named by `config`.
    pub async fn open(config: Config) -> Result<Self, CliError> {
        let db_cfg = database_config_from_config(&config);
        let store = queuectl_db::JobStore::open(&db_cfg).await?;
        tracing::debug!(
            path = %config.database.path.display(),
            max_connections = db_cfg.max_connections,
            "job store opened"
        );
        let queue = JobQueueClient::new(store).with_claim_window(config.worker.claim_window);
        Ok(Self { config, queue })
    }

    pub fn new(config: Config, queue: JobQueueClient) -> Self {
        Self { config, queue }
    }

    pub async fn close(&self) {
        self.queue.store().close().await;
    }
}
