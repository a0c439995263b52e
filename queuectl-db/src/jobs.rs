//! Job table queries.
//!
//! Every mutation is a single conditional statement. SQLite serialises writers,
//! so a `WHERE` clause re-checking the expected state is enough to make claims
//! and transitions compare-and-set operations.

use sqlx::Executor;

use crate::error::StoreError;
use crate::rows::{JobRow, JobUpdate, NewJob, TransitionGuard, JOB_COLUMNS};
use crate::state::JobState;
use crate::{DbBackend, DbPool};

/// Persist a new pending job. Fails with [`StoreError::DuplicateJob`] when the id is taken.
pub async fn insert<'e, E>(executor: E, job: &NewJob) -> Result<JobRow, StoreError>
where
    E: Executor<'e, Database = DbBackend>,
{
    let sql = format!(
        "INSERT INTO jobs (id, command, state, attempts, max_retries, ready_at, owner, claimed_at, \
         last_error, created_at, updated_at) \
         VALUES (?, ?, ?, 0, ?, ?, NULL, NULL, NULL, ?, ?) RETURNING {JOB_COLUMNS}"
    );
    sqlx::query_as::<_, JobRow>(&sql)
        .bind(&job.id)
        .bind(&job.command)
        .bind(JobState::Pending.as_str())
        .bind(job.max_retries)
        .bind(job.now)
        .bind(job.now)
        .bind(job.now)
        .fetch_one(executor)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::DuplicateJob(job.id.clone())
            }
            other => StoreError::Sqlx(other),
        })
}

/// Claim the oldest eligible pending job for `owner`.
///
/// Up to `limit` candidates are read in FIFO order (`created_at`, then `id`) and
/// claimed one at a time with a compare-and-set update. A candidate taken by a
/// concurrent claimer between the read and the write simply fails its CAS and
/// the next one is tried, so claimers never block on each other's rows and no
/// two callers can receive the same job.
pub async fn atomic_claim(
    pool: &DbPool,
    owner: &str,
    now: i64,
    limit: u32,
) -> Result<Option<JobRow>, StoreError> {
    let candidates: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM jobs WHERE state = ? AND ready_at <= ? \
         ORDER BY created_at ASC, id ASC LIMIT ?",
    )
    .bind(JobState::Pending.as_str())
    .bind(now)
    .bind(i64::from(limit.max(1)))
    .fetch_all(pool)
    .await?;

    let sql = format!(
        "UPDATE jobs SET state = ?, owner = ?, claimed_at = ?, updated_at = ? \
         WHERE id = ? AND state = ? AND ready_at <= ? RETURNING {JOB_COLUMNS}"
    );
    for id in candidates {
        let claimed = sqlx::query_as::<_, JobRow>(&sql)
            .bind(JobState::Processing.as_str())
            .bind(owner)
            .bind(now)
            .bind(now)
            .bind(&id)
            .bind(JobState::Pending.as_str())
            .bind(now)
            .fetch_optional(pool)
            .await?;
        match claimed {
            Some(row) => return Ok(Some(row)),
            None => tracing::trace!(job_id = %id, "claim candidate taken by another worker"),
        }
    }
    Ok(None)
}

/// Apply `update` only if the stored row still matches `guard`.
///
/// Returns [`StoreError::StaleTransition`] when the row moved on since it was
/// read, or [`StoreError::NotFound`] when it no longer exists.
pub async fn transition(
    pool: &DbPool,
    id: &str,
    guard: &TransitionGuard,
    update: &JobUpdate,
) -> Result<JobRow, StoreError> {
    let sql = format!(
        "UPDATE jobs SET state = ?, attempts = ?, owner = ?, claimed_at = ?, ready_at = ?, \
         last_error = ?, updated_at = ? \
         WHERE id = ? AND state = ? AND owner IS ? AND claimed_at IS ? AND attempts = ? \
         RETURNING {JOB_COLUMNS}"
    );
    let updated = sqlx::query_as::<_, JobRow>(&sql)
        .bind(update.state.as_str())
        .bind(update.attempts)
        .bind(update.owner.as_deref())
        .bind(update.claimed_at)
        .bind(update.ready_at)
        .bind(update.last_error.as_deref())
        .bind(update.updated_at)
        .bind(id)
        .bind(guard.state.as_str())
        .bind(guard.owner.as_deref())
        .bind(guard.claimed_at)
        .bind(guard.attempts)
        .fetch_optional(pool)
        .await?;

    match updated {
        Some(row) => Ok(row),
        None if exists(pool, id).await? => Err(StoreError::StaleTransition(id.to_owned())),
        None => Err(StoreError::NotFound(id.to_owned())),
    }
}

/// Jobs still `processing` whose lease (`claimed_at + lease_ms`) ended before `now`.
pub async fn find_stale<'e, E>(executor: E, now: i64, lease_ms: i64) -> Result<Vec<JobRow>, StoreError>
where
    E: Executor<'e, Database = DbBackend>,
{
    let sql = format!(
        "SELECT {JOB_COLUMNS} FROM jobs \
         WHERE state = ? AND claimed_at IS NOT NULL AND claimed_at + ? < ? \
         ORDER BY claimed_at ASC, id ASC"
    );
    let rows = sqlx::query_as::<_, JobRow>(&sql)
        .bind(JobState::Processing.as_str())
        .bind(lease_ms)
        .bind(now)
        .fetch_all(executor)
        .await?;
    Ok(rows)
}

pub async fn get<'e, E>(executor: E, id: &str) -> Result<Option<JobRow>, StoreError>
where
    E: Executor<'e, Database = DbBackend>,
{
    let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?");
    let row = sqlx::query_as::<_, JobRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn exists<'e, E>(executor: E, id: &str) -> Result<bool, StoreError>
where
    E: Executor<'e, Database = DbBackend>,
{
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM jobs WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(found.is_some())
}

/// Most recently updated jobs first, optionally restricted to one state.
pub async fn list<'e, E>(
    executor: E,
    state: Option<JobState>,
    limit: u32,
    offset: u32,
) -> Result<Vec<JobRow>, StoreError>
where
    E: Executor<'e, Database = DbBackend>,
{
    let rows = match state {
        Some(state) => {
            let sql = format!(
                "SELECT {JOB_COLUMNS} FROM jobs WHERE state = ? \
                 ORDER BY updated_at DESC, id ASC LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, JobRow>(&sql)
                .bind(state.as_str())
                .bind(i64::from(limit))
                .bind(i64::from(offset))
                .fetch_all(executor)
                .await?
        }
        None => {
            let sql = format!(
                "SELECT {JOB_COLUMNS} FROM jobs ORDER BY updated_at DESC, id ASC LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, JobRow>(&sql)
                .bind(i64::from(limit))
                .bind(i64::from(offset))
                .fetch_all(executor)
                .await?
        }
    };
    Ok(rows)
}

/// Number of jobs per stored state string.
pub async fn count_by_state<'e, E>(executor: E) -> Result<Vec<(String, i64)>, StoreError>
where
    E: Executor<'e, Database = DbBackend>,
{
    let counts = sqlx::query_as::<_, (String, i64)>(
        "SELECT state, COUNT(*) FROM jobs GROUP BY state ORDER BY state",
    )
    .fetch_all(executor)
    .await?;
    Ok(counts)
}
