//! Error types for the job lifecycle engine.

use queuectl_db::{JobState, StoreError};
use thiserror::Error;

/// Errors that may occur while driving jobs through their lifecycle.
#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("job '{0}' already exists")]
    DuplicateJob(String),

    #[error("invalid job spec: {0}")]
    InvalidSpec(String),

    /// The job moved on (reclaimed, reported, retried) since the caller read it.
    #[error("job '{0}' was modified concurrently; update discarded")]
    StaleTransition(String),

    #[error("job '{id}' is not in the dead letter queue (state: {state})")]
    NotInDlq { id: String, state: JobState },

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("unknown setting '{0}' (expected max-retries, backoff-base or worker-timeout)")]
    UnknownSetting(String),

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidSetting {
        key: String,
        value: String,
        reason: String,
    },

    #[error("job store temporarily unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    #[error(transparent)]
    Store(StoreError),
}

impl JobQueueError {
    /// True when retrying the same call later may succeed.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    #[inline]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleTransition(_))
    }
}

impl From<StoreError> for JobQueueError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateJob(id) => Self::DuplicateJob(id),
            StoreError::StaleTransition(id) => Self::StaleTransition(id),
            StoreError::NotFound(id) => Self::NotFound(id),
            other if other.is_transient() => Self::StoreUnavailable(other),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queuectl_db::SqlxError;

    #[test]
    fn store_errors_map_onto_engine_taxonomy() {
        let err: JobQueueError = StoreError::DuplicateJob("a".into()).into();
        assert!(matches!(err, JobQueueError::DuplicateJob(ref id) if id == "a"));

        let err: JobQueueError = StoreError::StaleTransition("a".into()).into();
        assert!(err.is_stale());
        assert!(!err.is_transient());

        let err: JobQueueError = StoreError::Sqlx(SqlxError::PoolTimedOut).into();
        assert!(err.is_transient());

        let err: JobQueueError = StoreError::Corrupt("bad".into()).into();
        assert!(matches!(err, JobQueueError::Store(_)));
    }
}
