//! The persisted queue configuration record (one row per key).

use sqlx::Executor;

use crate::error::StoreError;
use crate::rows::ConfigRow;
use crate::DbBackend;

pub async fn read_all<'e, E>(executor: E) -> Result<Vec<ConfigRow>, StoreError>
where
    E: Executor<'e, Database = DbBackend>,
{
    let rows = sqlx::query_as::<_, ConfigRow>(
        "SELECT key, value, updated_at FROM queue_config ORDER BY key",
    )
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

pub async fn write<'e, E>(executor: E, key: &str, value: i64, now: i64) -> Result<(), StoreError>
where
    E: Executor<'e, Database = DbBackend>,
{
    sqlx::query(
        "INSERT INTO queue_config (key, value, updated_at) VALUES (?, ?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(value)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}
