//! Periodic recovery of jobs whose worker stopped reporting.

use std::time::Duration;

use queuectl_job_queue::{JobQueueClient, JobQueueError, ReapReport};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::shutdown::sleep_or_shutdown;

pub const DEFAULT_REAPER_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_WORKER_STALE_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ReaperOptions {
    pub interval: Duration,
    /// Registry rows without a heartbeat for this long are removed.
    pub worker_stale_after: Duration,
}

impl Default for ReaperOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REAPER_INTERVAL,
            worker_stale_after: DEFAULT_WORKER_STALE_AFTER,
        }
    }
}

/// Requeues or dead-letters jobs left `processing` past their lease.
///
/// Several reapers may sweep the same store at once (one per worker process);
/// the engine's conditional writes make each reclaim apply exactly once.
#[derive(Debug, Clone)]
pub struct Reaper {
    queue: JobQueueClient,
    options: ReaperOptions,
}

impl Reaper {
    pub fn new(queue: JobQueueClient, options: ReaperOptions) -> Self {
        Self { queue, options }
    }

    /// One sweep: reclaim expired leases, then forget silent workers.
    pub async fn sweep_once(&self) -> Result<ReapReport, JobQueueError> {
        let report = self.queue.reclaim_stale().await?;
        if report.is_empty() {
            debug!("reaper sweep found no expired leases");
        } else {
            info!(
                requeued = report.requeued,
                dead_lettered = report.dead_lettered,
                skipped = report.skipped,
                "reaper sweep reclaimed expired leases"
            );
        }

        let pruned = self.queue.prune_workers(self.options.worker_stale_after).await?;
        if pruned > 0 {
            info!(pruned, "removed workers with no recent heartbeat");
        }
        Ok(report)
    }

    /// Sweep every `interval` until shutdown. Sweep errors are logged and the
    /// next sweep tries again.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> ReapReport {
        let mut total = ReapReport::default();
        loop {
            match self.sweep_once().await {
                Ok(report) => {
                    total.requeued += report.requeued;
                    total.dead_lettered += report.dead_lettered;
                    total.skipped += report.skipped;
                }
                Err(e) => warn!(error = %e, "reaper sweep failed"),
            }
            if sleep_or_shutdown(self.options.interval, &mut shutdown).await {
                break;
            }
        }
        debug!("reaper stopped");
        total
    }
}
