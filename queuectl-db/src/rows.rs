use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::state::JobState;

/// Column list shared by every query that returns full job rows.
pub(crate) const JOB_COLUMNS: &str = "id, command, state, attempts, max_retries, ready_at, owner, \
     claimed_at, last_error, created_at, updated_at";

/// A job as persisted in the `jobs` table. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobRow {
    pub id: String,
    pub command: String,
    pub state: String,
    pub attempts: i64,
    pub max_retries: Option<i64>,
    pub ready_at: i64,
    pub owner: Option<String>,
    pub claimed_at: Option<i64>,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl JobRow {
    pub fn job_state(&self) -> Result<JobState, StoreError> {
        self.state
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("job '{}': {e}", self.id)))
    }

    /// The guard matching this row exactly as it was read.
    pub fn guard(&self) -> Result<TransitionGuard, StoreError> {
        Ok(TransitionGuard {
            state: self.job_state()?,
            owner: self.owner.clone(),
            claimed_at: self.claimed_at,
            attempts: self.attempts,
        })
    }
}

/// Insert payload for a brand new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: String,
    pub command: String,
    pub max_retries: Option<i64>,
    pub now: i64,
}

/// Expected values a conditional transition compares against before writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionGuard {
    pub state: JobState,
    pub owner: Option<String>,
    pub claimed_at: Option<i64>,
    pub attempts: i64,
}

/// Replacement values for the mutable columns of a job row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub state: JobState,
    pub attempts: i64,
    pub owner: Option<String>,
    pub claimed_at: Option<i64>,
    pub ready_at: i64,
    pub last_error: Option<String>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConfigRow {
    pub key: String,
    pub value: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkerRow {
    pub id: String,
    pub pid: i64,
    pub hostname: Option<String>,
    pub started_at: i64,
    pub heartbeat_at: i64,
    pub stop_requested: bool,
}
