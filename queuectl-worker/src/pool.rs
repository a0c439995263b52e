//! Runs several workers and one reaper in the current process.

use std::sync::Arc;

use queuectl_job_queue::{CommandRunner, JobQueueClient};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::WorkerError;
use crate::reaper::{Reaper, ReaperOptions};
use crate::shutdown::shutdown_signal;
use crate::worker::{Worker, WorkerOptions, WorkerStats};

#[derive(Debug, Clone, Default)]
pub struct PoolOptions {
    pub worker: WorkerOptions,
    pub reaper: ReaperOptions,
}

/// Aggregate outcome of a pool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolSummary {
    pub workers: usize,
    pub totals: WorkerStats,
    pub reaped: queuectl_job_queue::ReapReport,
}

pub struct WorkerPool {
    queue: JobQueueClient,
    runner: Arc<dyn CommandRunner>,
    options: PoolOptions,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("queue", &self.queue)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    pub fn new(queue: JobQueueClient, runner: Arc<dyn CommandRunner>, options: PoolOptions) -> Self {
        Self {
            queue,
            runner,
            options,
        }
    }

    /// Run `count` workers plus a reaper until every worker has stopped.
    ///
    /// Workers stop on `shutdown` or on the store's stop flag; the reaper is
    /// stopped once the last worker is gone. A fatal worker error does not stop
    /// the others; the first one is returned after everything has been joined.
    pub async fn run(
        self,
        count: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Result<PoolSummary, WorkerError> {
        let count = count.max(1);
        let (reaper_tx, reaper_rx) = shutdown_signal();
        let reaper = Reaper::new(self.queue.clone(), self.options.reaper.clone());
        let reaper_handle = tokio::spawn(reaper.run(reaper_rx));

        let run_id = Uuid::new_v4().simple().to_string();
        let mut workers = JoinSet::new();
        for n in 1..=count {
            let id = format!("worker-{}-{n}", &run_id[..8]);
            let worker = Worker::new(
                id,
                self.queue.clone(),
                Arc::clone(&self.runner),
                self.options.worker.clone(),
            );
            workers.spawn(worker.run(shutdown.clone()));
        }
        info!(workers = count, "worker pool started");

        let mut summary = PoolSummary {
            workers: count,
            ..PoolSummary::default()
        };
        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            let outcome = joined.map_err(|e| WorkerError::Task(e.to_string())).and_then(|r| r);
            match outcome {
                Ok(stats) => {
                    summary.totals.succeeded += stats.succeeded;
                    summary.totals.failed += stats.failed;
                    summary.totals.stale_reports += stats.stale_reports;
                }
                Err(e) => {
                    error!(error = %e, "worker exited with an error");
                    first_error.get_or_insert(e);
                }
            }
        }

        let _ = reaper_tx.send(true);
        match reaper_handle.await {
            Ok(reaped) => summary.reaped = reaped,
            Err(e) => error!(error = %e, "reaper task failed"),
        }

        info!(
            succeeded = summary.totals.succeeded,
            failed = summary.totals.failed,
            "worker pool stopped"
        );
        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }
}
