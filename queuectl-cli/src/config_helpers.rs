use std::time::Duration;

use queuectl_config::Config;
use queuectl_db::DbConnectionConfig;
use queuectl_worker::{PoolOptions, ReaperOptions, WorkerOptions};

/// Build database connection config from application config.
pub fn database_config_from_config(cfg: &Config) -> DbConnectionConfig {
    let mut db = DbConnectionConfig::for_path(&cfg.database.path);
    db.max_connections = cfg.database.max_connections;
    db.busy_timeout_secs = cfg.database.busy_timeout_secs;
    db
}

/// Worker and reaper pacing for `worker start`.
pub fn pool_options_from_config(cfg: &Config) -> PoolOptions {
    PoolOptions {
        worker: WorkerOptions {
            poll_interval: Duration::from_millis(cfg.worker.poll_interval_ms),
            store_retry_budget: cfg.worker.store_retry_budget,
            heartbeat_interval: Duration::from_secs(cfg.worker.heartbeat_stale_secs) / 4,
        },
        reaper: ReaperOptions {
            interval: Duration::from_secs(cfg.worker.reaper_interval_secs),
            worker_stale_after: Duration::from_secs(cfg.worker.heartbeat_stale_secs),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn database_config_uses_file_url() {
        let mut cfg = Config::default();
        cfg.database.path = PathBuf::from("/var/lib/queuectl/jobs.db");
        cfg.database.busy_timeout_secs = 9;
        cfg.database.max_connections = 3;
        let db = database_config_from_config(&cfg);
        assert_eq!(db.url, "sqlite:///var/lib/queuectl/jobs.db");
        assert_eq!(db.busy_timeout_secs, 9);
        assert_eq!(db.max_connections, 3);
    }

    #[test]
    fn pool_options_follow_worker_section() {
        let mut cfg = Config::default();
        cfg.worker.poll_interval_ms = 250;
        cfg.worker.heartbeat_stale_secs = 30;
        let opts = pool_options_from_config(&cfg);
        assert_eq!(opts.worker.poll_interval, Duration::from_millis(250));
        assert_eq!(opts.worker.store_retry_budget, 5);
        assert_eq!(opts.reaper.interval, Duration::from_secs(5));
        assert_eq!(opts.reaper.worker_stale_after, Duration::from_secs(30));
        assert_eq!(opts.worker.heartbeat_interval, Duration::from_millis(7500));
    }
}
