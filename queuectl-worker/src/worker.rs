//! The claim, execute, report loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use queuectl_job_queue::{
    CommandRunner, FailureReason, Job, JobQueueClient, JobQueueError, JobState,
};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::WorkerError;
use crate::shutdown::sleep_or_shutdown;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_STORE_RETRY_BUDGET: u32 = 5;
pub const MAX_STORE_BACKOFF: Duration = Duration::from_secs(30);
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Idle sleep between empty claims; also the base of the store retry backoff.
    pub poll_interval: Duration,
    /// Consecutive transient store failures tolerated before the worker gives up.
    pub store_retry_budget: u32,
    /// Heartbeat period while a job is running. Keep it well under the
    /// reaper's `worker_stale_after`.
    pub heartbeat_interval: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            store_retry_budget: DEFAULT_STORE_RETRY_BUDGET,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl WorkerOptions {
    fn store_backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.poll_interval
            .saturating_mul(factor)
            .min(MAX_STORE_BACKOFF)
    }
}

/// What a worker did before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub succeeded: u64,
    pub failed: u64,
    /// Reports discarded because the job was reclaimed first.
    pub stale_reports: u64,
}

impl WorkerStats {
    #[inline]
    pub fn processed(&self) -> u64 {
        self.succeeded + self.failed + self.stale_reports
    }
}

/// Runs one job at a time until asked to stop.
pub struct Worker {
    id: String,
    hostname: Option<String>,
    queue: JobQueueClient,
    runner: Arc<dyn CommandRunner>,
    options: WorkerOptions,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        queue: JobQueueClient,
        runner: Arc<dyn CommandRunner>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            id: id.into(),
            hostname: std::env::var("HOSTNAME").ok(),
            queue,
            runner,
            options,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Loop until `shutdown` fires or the store's stop flag is set for this worker.
    ///
    /// A job that has been claimed is always run and reported before the loop
    /// checks for shutdown again. The worker registers itself on start and
    /// deregisters on the way out, including after a fatal error.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<WorkerStats, WorkerError> {
        self.with_store_retry("register", || self.register()).await?;
        info!(worker_id = %self.id, "worker started");

        let result = self.run_loop(&mut shutdown).await;

        if let Err(e) = self.queue.deregister_worker(&self.id).await {
            warn!(worker_id = %self.id, error = %e, "failed to deregister worker");
        }
        match &result {
            Ok(stats) => info!(
                worker_id = %self.id,
                succeeded = stats.succeeded,
                failed = stats.failed,
                stale_reports = stats.stale_reports,
                "worker stopped"
            ),
            Err(e) => tracing::error!(worker_id = %self.id, error = %e, "worker stopped on fatal error"),
        }
        result
    }

    async fn run_loop(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<WorkerStats, WorkerError> {
        let mut stats = WorkerStats::default();
        loop {
            if *shutdown.borrow() {
                debug!(worker_id = %self.id, "shutdown signal received");
                break;
            }
            if self
                .with_store_retry("check stop flag", || self.queue.stop_requested(&self.id))
                .await?
            {
                info!(worker_id = %self.id, "stop requested through the job store");
                break;
            }
            self.heartbeat().await;

            match self
                .with_store_retry("claim", || self.queue.claim(&self.id))
                .await?
            {
                Some(job) => self.process(job, &mut stats).await?,
                None => {
                    if sleep_or_shutdown(self.options.poll_interval, shutdown).await {
                        break;
                    }
                }
            }
        }
        Ok(stats)
    }

    async fn process(&self, job: Job, stats: &mut WorkerStats) -> Result<(), WorkerError> {
        // Read at this checkpoint so `config set worker-timeout` reaches running workers.
        let settings = self
            .with_store_retry("read settings", || self.queue.settings())
            .await?;
        let deadline = settings.worker_timeout();

        info!(
            worker_id = %self.id,
            job_id = %job.id,
            attempts = job.attempts,
            "processing job"
        );
        let mut run = self.runner.run(&job.command, deadline);
        let mut ticker = tokio::time::interval(self.options.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the loop already beat before claiming.
        ticker.tick().await;
        let outcome = loop {
            tokio::select! {
                outcome = &mut run => break outcome,
                _ = ticker.tick() => self.heartbeat().await,
            }
        };

        let reported = match outcome {
            Ok(0) => {
                self.with_store_retry("report success", || {
                    self.queue.report_success(&job, &self.id)
                })
                .await
            }
            Ok(code) => self.report_failure(&job, FailureReason::NonZeroExit(code)).await,
            Err(err) => self.report_failure(&job, err.into()).await,
        };

        match reported {
            Ok(after) if after.state == JobState::Completed => {
                stats.succeeded += 1
            }
            Ok(_) => stats.failed += 1,
            Err(WorkerError::Queue(
                err @ (JobQueueError::StaleTransition(_) | JobQueueError::NotFound(_)),
            )) => {
                info!(
                    worker_id = %self.id,
                    job_id = %job.id,
                    reason = %err,
                    "job was reclaimed before the report landed; discarding result"
                );
                stats.stale_reports += 1;
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    async fn register(&self) -> Result<(), JobQueueError> {
        self.queue
            .register_worker(&self.id, std::process::id(), self.hostname.clone())
            .await
    }

    /// Best effort: refresh the registry row, recreating it if the reaper pruned it.
    async fn heartbeat(&self) {
        match self.queue.heartbeat(&self.id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(worker_id = %self.id, "worker registration was pruned; registering again");
                if let Err(e) = self.register().await {
                    warn!(worker_id = %self.id, error = %e, "failed to re-register worker");
                }
            }
            Err(e) => warn!(worker_id = %self.id, error = %e, "failed to record heartbeat"),
        }
    }

    async fn report_failure(&self, job: &Job, reason: FailureReason) -> Result<Job, WorkerError> {
        self.with_store_retry("report failure", || {
            self.queue.report_failure(job, &self.id, reason.clone())
        })
        .await
    }

    /// Run `op`, retrying transient store failures with exponential backoff.
    ///
    /// The backoff sleep is not interrupted by shutdown, so a finished job still
    /// gets reported.
    async fn with_store_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, WorkerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, JobQueueError>>,
    {
        let mut failures = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    failures += 1;
                    if failures > self.options.store_retry_budget {
                        return Err(WorkerError::StoreUnavailable {
                            attempts: failures,
                            source: err,
                        });
                    }
                    let delay = self.options.store_backoff(failures);
                    warn!(
                        worker_id = %self.id,
                        operation = what,
                        failures,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "job store unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backoff_doubles_and_caps() {
        let options = WorkerOptions {
            poll_interval: Duration::from_millis(100),
            store_retry_budget: 10,
            ..WorkerOptions::default()
        };
        assert_eq!(options.store_backoff(1), Duration::from_millis(100));
        assert_eq!(options.store_backoff(3), Duration::from_millis(400));
        assert_eq!(options.store_backoff(40), MAX_STORE_BACKOFF);
    }

    #[test]
    fn stats_count_every_outcome() {
        let stats = WorkerStats {
            succeeded: 2,
            failed: 1,
            stale_reports: 1,
        };
        assert_eq!(stats.processed(), 4);
    }
}
