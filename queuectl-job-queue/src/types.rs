//! Core types for the job lifecycle engine.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use queuectl_db::{JobRow, JobState, TransitionGuard, WorkerRow};
use serde::{Deserialize, Serialize};

use crate::clock::{from_millis, to_millis};
use crate::error::JobQueueError;
use crate::executor::CommandError;

/// Default page size for listings.
pub const DEFAULT_LIST_LIMIT: u32 = 20;

/// A job submission: caller-chosen id, opaque command, optional retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    pub id: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl JobSpec {
    #[inline]
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            max_retries: None,
        }
    }

    #[inline]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Parse and validate a JSON submission such as `{"id":"a","command":"true"}`.
    pub fn from_json(raw: &str) -> Result<Self, JobQueueError> {
        let spec: Self = serde_json::from_str(raw)
            .map_err(|e| JobQueueError::InvalidSpec(format!("malformed job JSON: {e}")))?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), JobQueueError> {
        if self.id.trim().is_empty() {
            return Err(JobQueueError::InvalidSpec("id must not be empty".into()));
        }
        if self.command.trim().is_empty() {
            return Err(JobQueueError::InvalidSpec(
                "command must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// A job as seen by the engine and its callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub command: String,
    pub state: JobState,
    pub attempts: u32,
    /// Per-job override; `None` falls back to the queue setting.
    pub max_retries: Option<u32>,
    pub ready_at: DateTime<Utc>,
    pub owner: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.state == JobState::Dead
    }

    /// Guard expecting the row to be exactly this snapshot.
    pub(crate) fn guard(&self) -> TransitionGuard {
        TransitionGuard {
            state: self.state,
            owner: self.owner.clone(),
            claimed_at: self.claimed_at.map(to_millis),
            attempts: i64::from(self.attempts),
        }
    }
}

impl TryFrom<JobRow> for Job {
    type Error = JobQueueError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| {
            JobQueueError::Store(queuectl_db::StoreError::Corrupt(format!(
                "job '{}': {what}",
                row.id
            )))
        };
        let state = row.job_state()?;
        let attempts = u32::try_from(row.attempts).map_err(|_| corrupt("attempts out of range"))?;
        let max_retries = row
            .max_retries
            .map(u32::try_from)
            .transpose()
            .map_err(|_| corrupt("max_retries out of range"))?;
        let ready_at = from_millis(row.ready_at)?;
        let claimed_at = row.claimed_at.map(from_millis).transpose()?;
        let created_at = from_millis(row.created_at)?;
        let updated_at = from_millis(row.updated_at)?;

        Ok(Self {
            id: row.id,
            command: row.command,
            state,
            attempts,
            max_retries,
            ready_at,
            owner: row.owner,
            claimed_at,
            last_error: row.last_error,
            created_at,
            updated_at,
        })
    }
}

/// Listing filter. Results are ordered most recently updated first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobFilter {
    pub state: Option<JobState>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            state: None,
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

impl JobFilter {
    pub fn state(state: JobState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }
}

/// Job counts per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub dead: u64,
    pub total: u64,
}

impl QueueStats {
    pub fn from_counts(counts: &[(JobState, i64)]) -> Self {
        let mut stats = Self::default();
        for (state, n) in counts {
            let n = u64::try_from(*n).unwrap_or(0);
            match state {
                JobState::Pending => stats.pending += n,
                JobState::Processing => stats.processing += n,
                JobState::Completed => stats.completed += n,
                JobState::Failed => stats.failed += n,
                JobState::Dead => stats.dead += n,
            }
            stats.total += n;
        }
        stats
    }

    pub fn count(&self, state: JobState) -> u64 {
        match state {
            JobState::Pending => self.pending,
            JobState::Processing => self.processing,
            JobState::Completed => self.completed,
            JobState::Failed => self.failed,
            JobState::Dead => self.dead,
        }
    }
}

/// Why an attempt failed. Stored as the job's `last_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    NonZeroExit(i32),
    LaunchFailure(String),
    DeadlineExceeded(Duration),
    /// The owner never reported before its lease ran out.
    LeaseExpired,
}

impl From<CommandError> for FailureReason {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::LaunchFailure(msg) => Self::LaunchFailure(msg),
            CommandError::DeadlineExceeded(after) => Self::DeadlineExceeded(after),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonZeroExit(code) => write!(f, "command exited with code {code}"),
            Self::LaunchFailure(msg) => write!(f, "failed to launch command: {msg}"),
            Self::DeadlineExceeded(after) => {
                write!(f, "command timed out after {}s", after.as_secs())
            }
            Self::LeaseExpired => f.write_str("worker lease expired before a report"),
        }
    }
}

/// Outcome of one stale-lease sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    pub requeued: u32,
    pub dead_lettered: u32,
    /// Candidates that changed under the sweep (reported or reaped elsewhere).
    pub skipped: u32,
}

impl ReapReport {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.requeued == 0 && self.dead_lettered == 0 && self.skipped == 0
    }
}

/// A registered worker instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerInfo {
    pub id: String,
    pub pid: u32,
    pub hostname: Option<String>,
    pub started_at: DateTime<Utc>,
    pub heartbeat_at: DateTime<Utc>,
    pub stop_requested: bool,
}

impl TryFrom<WorkerRow> for WorkerInfo {
    type Error = JobQueueError;

    fn try_from(row: WorkerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            pid: u32::try_from(row.pid).unwrap_or(0),
            started_at: from_millis(row.started_at)?,
            heartbeat_at: from_millis(row.heartbeat_at)?,
            id: row.id,
            hostname: row.hostname,
            stop_requested: row.stop_requested,
        })
    }
}
