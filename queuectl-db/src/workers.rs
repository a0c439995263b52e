//! Registry of running worker instances. Nothing here affects job correctness.

use sqlx::Executor;

use crate::error::StoreError;
use crate::rows::WorkerRow;
use crate::DbBackend;

pub async fn register<'e, E>(executor: E, worker: &WorkerRow) -> Result<(), StoreError>
where
    E: Executor<'e, Database = DbBackend>,
{
    sqlx::query(
        "INSERT OR REPLACE INTO workers (id, pid, hostname, started_at, heartbeat_at, stop_requested) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&worker.id)
    .bind(worker.pid)
    .bind(worker.hostname.as_deref())
    .bind(worker.started_at)
    .bind(worker.heartbeat_at)
    .bind(worker.stop_requested)
    .execute(executor)
    .await?;
    Ok(())
}

/// Refresh `id`'s heartbeat. Returns false when the row is gone (pruned or never registered).
pub async fn heartbeat<'e, E>(executor: E, id: &str, now: i64) -> Result<bool, StoreError>
where
    E: Executor<'e, Database = DbBackend>,
{
    let result = sqlx::query("UPDATE workers SET heartbeat_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn deregister<'e, E>(executor: E, id: &str) -> Result<(), StoreError>
where
    E: Executor<'e, Database = DbBackend>,
{
    sqlx::query("DELETE FROM workers WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn list<'e, E>(executor: E) -> Result<Vec<WorkerRow>, StoreError>
where
    E: Executor<'e, Database = DbBackend>,
{
    let rows = sqlx::query_as::<_, WorkerRow>(
        "SELECT id, pid, hostname, started_at, heartbeat_at, stop_requested \
         FROM workers ORDER BY started_at ASC, id ASC",
    )
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Flag every registered worker for graceful shutdown. Returns how many were flagged.
pub async fn request_stop_all<'e, E>(executor: E) -> Result<u64, StoreError>
where
    E: Executor<'e, Database = DbBackend>,
{
    let result = sqlx::query("UPDATE workers SET stop_requested = 1 WHERE stop_requested = 0")
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Whether `id` has been asked to stop. An unregistered worker has not.
pub async fn stop_requested<'e, E>(executor: E, id: &str) -> Result<bool, StoreError>
where
    E: Executor<'e, Database = DbBackend>,
{
    let flag: Option<bool> = sqlx::query_scalar("SELECT stop_requested FROM workers WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(flag.unwrap_or(false))
}

/// Drop registry rows whose heartbeat is older than `before`.
pub async fn prune_stale<'e, E>(executor: E, before: i64) -> Result<u64, StoreError>
where
    E: Executor<'e, Database = DbBackend>,
{
    let result = sqlx::query("DELETE FROM workers WHERE heartbeat_at < ?")
        .bind(before)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
