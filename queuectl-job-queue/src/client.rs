//! Job queue client implementation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use queuectl_db::{JobRow, JobState, JobStore, JobUpdate, NewJob, TransitionGuard, WorkerRow};
use tracing::{debug, info, warn};

use crate::clock::{to_millis, Clock, SystemClock};
use crate::error::JobQueueError;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::settings::{QueueSettings, SettingKey};
use crate::types::{FailureReason, Job, JobFilter, JobSpec, QueueStats, ReapReport, WorkerInfo};

/// Number of eligible jobs a claim looks at before giving up on a busy queue.
pub const DEFAULT_CLAIM_WINDOW: u32 = 8;

/// Owns the job state machine. Every state change goes through here.
///
/// Holds no job state of its own: each operation reads what it needs from the
/// store and writes back with a conditional update, so any number of clients in
/// any number of processes can share one database.
#[derive(Clone)]
pub struct JobQueueClient {
    store: JobStore,
    clock: Arc<dyn Clock>,
    claim_window: u32,
}

impl fmt::Debug for JobQueueClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueueClient")
            .field("store", &"<JobStore>")
            .field("clock", &self.clock)
            .field("claim_window", &self.claim_window)
            .finish()
    }
}

impl JobQueueClient {
    pub fn new(store: JobStore) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: JobStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            claim_window: DEFAULT_CLAIM_WINDOW,
        }
    }

    pub fn with_claim_window(mut self, claim_window: u32) -> Self {
        self.claim_window = claim_window.max(1);
        self
    }

    #[inline]
    pub fn store(&self) -> &JobStore {
        &self.store
    }

    #[inline]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current queue settings, read fresh from the store.
    pub async fn settings(&self) -> Result<QueueSettings, JobQueueError> {
        let rows = self.store.read_config().await?;
        Ok(QueueSettings::from_rows(&rows))
    }

    /// Persist one setting. Affects only decisions made after this returns.
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<QueueSettings, JobQueueError> {
        let key: SettingKey = key.parse()?;
        let value = key.parse_value(value)?;
        let stored = i64::try_from(value).map_err(|_| JobQueueError::InvalidSetting {
            key: key.display_name().to_owned(),
            value: value.to_string(),
            reason: "value too large".into(),
        })?;
        self.store
            .write_config(key.as_str(), stored, to_millis(self.now()))
            .await?;
        info!(key = %key, value, "queue setting updated");
        self.settings().await
    }

    /// Create a pending job, eligible immediately.
    pub async fn enqueue(&self, spec: JobSpec) -> Result<Job, JobQueueError> {
        spec.validate()?;
        let row = self
            .store
            .insert(&NewJob {
                id: spec.id,
                command: spec.command,
                max_retries: spec.max_retries.map(i64::from),
                now: to_millis(self.now()),
            })
            .await?;
        info!(job_id = %row.id, "job enqueued");
        Job::try_from(row)
    }

    /// Claim the oldest eligible pending job for `worker_id`, if any.
    pub async fn claim(&self, worker_id: &str) -> Result<Option<Job>, JobQueueError> {
        let now = to_millis(self.now());
        let Some(row) = self
            .store
            .atomic_claim(worker_id, now, self.claim_window)
            .await?
        else {
            return Ok(None);
        };
        debug!(job_id = %row.id, worker_id, attempts = row.attempts, "job claimed");
        Job::try_from(row).map(Some)
    }

    /// Mark a claimed job completed.
    ///
    /// `job` is the record returned by [`claim`](Self::claim). Fails with
    /// [`JobQueueError::StaleTransition`] if the claim is no longer current
    /// (reclaimed by the reaper, or claimed again since).
    pub async fn report_success(&self, job: &Job, worker_id: &str) -> Result<Job, JobQueueError> {
        let guard = owned_guard(job, worker_id);
        let now = to_millis(self.now());
        let row = self
            .store
            .transition(
                &job.id,
                &guard,
                &JobUpdate {
                    state: JobState::Completed,
                    attempts: guard.attempts,
                    owner: None,
                    claimed_at: None,
                    ready_at: to_millis(job.ready_at),
                    last_error: None,
                    updated_at: now,
                },
            )
            .await?;
        info!(job_id = %row.id, worker_id, "job completed");
        Job::try_from(row)
    }

    /// Record a failed attempt of a claimed job: schedule a retry or dead-letter it.
    ///
    /// Guarded exactly like [`report_success`](Self::report_success).
    pub async fn report_failure(
        &self,
        job: &Job,
        worker_id: &str,
        reason: FailureReason,
    ) -> Result<Job, JobQueueError> {
        let guard = owned_guard(job, worker_id);
        let settings = self.settings().await?;
        let (row, _) = self
            .fail_attempt(job, guard, &settings, &reason)
            .await?;
        Job::try_from(row)
    }

    /// Fold every job whose lease has expired back into the retry/DLQ path.
    ///
    /// Each candidate is guarded on the stale owner and claim time it was found
    /// with, so concurrent sweeps and late reports cannot both apply.
    pub async fn reclaim_stale(&self) -> Result<ReapReport, JobQueueError> {
        let settings = self.settings().await?;
        let now = to_millis(self.now());
        let lease_ms = lease_millis(settings.worker_timeout());
        let stale = self.store.find_stale(now, lease_ms).await?;

        let mut report = ReapReport::default();
        for row in stale {
            let job = Job::try_from(row)?;
            let guard = job.guard();
            warn!(
                job_id = %job.id,
                worker_id = job.owner.as_deref().unwrap_or(""),
                "lease expired, reclaiming job"
            );
            match self
                .fail_attempt(&job, guard, &settings, &FailureReason::LeaseExpired)
                .await
            {
                Ok((_, RetryDecision::Retry { .. })) => report.requeued += 1,
                Ok((_, RetryDecision::DeadLetter)) => report.dead_lettered += 1,
                Err(JobQueueError::StaleTransition(_) | JobQueueError::NotFound(_)) => {
                    debug!(job_id = %job.id, "stale job changed before it could be reclaimed");
                    report.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(report)
    }

    /// Move a dead job back to `pending` with a fresh retry budget.
    pub async fn retry_from_dlq(&self, id: &str) -> Result<Job, JobQueueError> {
        let row = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| JobQueueError::NotFound(id.to_owned()))?;
        let job = Job::try_from(row)?;
        if !job.is_dead() {
            return Err(JobQueueError::NotInDlq {
                id: job.id,
                state: job.state,
            });
        }

        let now = to_millis(self.now());
        let row = self
            .store
            .transition(
                &job.id,
                &job.guard(),
                &JobUpdate {
                    state: JobState::Pending,
                    attempts: 0,
                    owner: None,
                    claimed_at: None,
                    ready_at: now.max(to_millis(job.ready_at)),
                    last_error: None,
                    updated_at: now,
                },
            )
            .await?;
        info!(job_id = %row.id, "job moved from dead letter queue back to pending");
        Job::try_from(row)
    }

    /// Shared failure path for reports and reclaims.
    async fn fail_attempt(
        &self,
        job: &Job,
        guard: TransitionGuard,
        settings: &QueueSettings,
        reason: &FailureReason,
    ) -> Result<(JobRow, RetryDecision), JobQueueError> {
        let attempts = job.attempts.saturating_add(1);
        let policy = RetryPolicy::for_job(settings, job.max_retries);
        let decision = policy.decide(attempts);
        let now = to_millis(self.now());

        let (state, ready_at) = match decision {
            RetryDecision::Retry { delay } => {
                let due = now.saturating_add(lease_millis(delay));
                (JobState::Pending, due.max(to_millis(job.ready_at)))
            }
            RetryDecision::DeadLetter => (JobState::Dead, to_millis(job.ready_at)),
        };

        let row = self
            .store
            .transition(
                &job.id,
                &guard,
                &JobUpdate {
                    state,
                    attempts: i64::from(attempts),
                    owner: None,
                    claimed_at: None,
                    ready_at: clamp_ready_at(ready_at),
                    last_error: Some(reason.to_string()),
                    updated_at: now,
                },
            )
            .await?;

        match decision {
            RetryDecision::Retry { delay } => info!(
                job_id = %row.id,
                attempts,
                max_retries = policy.max_retries,
                delay_secs = delay.as_secs(),
                error = %reason,
                "job failed, retry scheduled"
            ),
            RetryDecision::DeadLetter => warn!(
                job_id = %row.id,
                attempts,
                error = %reason,
                "job failed, moved to dead letter queue"
            ),
        }
        Ok((row, decision))
    }

    pub async fn get(&self, id: &str) -> Result<Job, JobQueueError> {
        let row = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| JobQueueError::NotFound(id.to_owned()))?;
        Job::try_from(row)
    }

    pub async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobQueueError> {
        let rows = self
            .store
            .list(filter.state, filter.limit, filter.offset)
            .await?;
        rows.into_iter().map(Job::try_from).collect()
    }

    pub async fn dlq_list(&self, limit: u32, offset: u32) -> Result<Vec<Job>, JobQueueError> {
        self.list(
            &JobFilter::state(JobState::Dead)
                .with_limit(limit)
                .with_offset(offset),
        )
        .await
    }

    pub async fn stats(&self) -> Result<QueueStats, JobQueueError> {
        let counts = self.store.count_by_state().await?;
        Ok(QueueStats::from_counts(&counts))
    }

    pub async fn register_worker(
        &self,
        worker_id: &str,
        pid: u32,
        hostname: Option<String>,
    ) -> Result<(), JobQueueError> {
        let now = to_millis(self.now());
        self.store
            .register_worker(&WorkerRow {
                id: worker_id.to_owned(),
                pid: i64::from(pid),
                hostname,
                started_at: now,
                heartbeat_at: now,
                stop_requested: false,
            })
            .await?;
        Ok(())
    }

    /// Refresh the worker's heartbeat. `Ok(false)` means its registry row is
    /// gone and the worker must register again to stay visible to `request_stop`.
    pub async fn heartbeat(&self, worker_id: &str) -> Result<bool, JobQueueError> {
        Ok(self
            .store
            .heartbeat_worker(worker_id, to_millis(self.now()))
            .await?)
    }

    pub async fn deregister_worker(&self, worker_id: &str) -> Result<(), JobQueueError> {
        self.store.deregister_worker(worker_id).await?;
        Ok(())
    }

    pub async fn workers(&self) -> Result<Vec<WorkerInfo>, JobQueueError> {
        let rows = self.store.list_workers().await?;
        rows.into_iter().map(WorkerInfo::try_from).collect()
    }

    /// Ask every registered worker to stop after its current job.
    pub async fn request_stop(&self) -> Result<u64, JobQueueError> {
        let flagged = self.store.request_stop_all().await?;
        info!(workers = flagged, "stop requested");
        Ok(flagged)
    }

    pub async fn stop_requested(&self, worker_id: &str) -> Result<bool, JobQueueError> {
        Ok(self.store.stop_requested(worker_id).await?)
    }

    /// Forget workers that have not sent a heartbeat for `stale_after`.
    pub async fn prune_workers(&self, stale_after: Duration) -> Result<u64, JobQueueError> {
        let before = to_millis(self.now()).saturating_sub(lease_millis(stale_after));
        Ok(self.store.prune_workers(before).await?)
    }
}

/// Guard for a report from `worker_id` on the claim captured in `job`.
fn owned_guard(job: &Job, worker_id: &str) -> TransitionGuard {
    TransitionGuard {
        state: JobState::Processing,
        owner: Some(worker_id.to_owned()),
        ..job.guard()
    }
}

fn lease_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn clamp_ready_at(ms: i64) -> i64 {
    ms.min(DateTime::<Utc>::MAX_UTC.timestamp_millis())
}
