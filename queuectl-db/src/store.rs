use queuectl_db_connection::{create_pool, DbConnectionConfig, DbPool};

use crate::error::StoreError;
use crate::rows::{ConfigRow, JobRow, JobUpdate, NewJob, TransitionGuard, WorkerRow};
use crate::state::JobState;
use crate::{jobs, queue_config, workers};

/// Handle to the durable store. Cheap to clone; all clones share one pool.
///
/// The store has no clock of its own. Callers pass `now` (epoch milliseconds)
/// into every time-dependent operation.
#[derive(Clone, Debug)]
pub struct JobStore {
    pool: DbPool,
}

impl JobStore {
    /// Open (creating if needed) the database described by `config` and bring
    /// its schema up to date.
    pub async fn open(config: &DbConnectionConfig) -> Result<Self, StoreError> {
        let pool = create_pool(config).await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, applying any pending migrations first.
    pub async fn from_pool(pool: DbPool) -> Result<Self, StoreError> {
        queuectl_migrations::sqlite_migrator().run(&pool).await?;
        tracing::debug!("job store schema is current");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn insert(&self, job: &NewJob) -> Result<JobRow, StoreError> {
        jobs::insert(&self.pool, job).await
    }

    pub async fn atomic_claim(
        &self,
        owner: &str,
        now: i64,
        limit: u32,
    ) -> Result<Option<JobRow>, StoreError> {
        jobs::atomic_claim(&self.pool, owner, now, limit).await
    }

    pub async fn transition(
        &self,
        id: &str,
        guard: &TransitionGuard,
        update: &JobUpdate,
    ) -> Result<JobRow, StoreError> {
        jobs::transition(&self.pool, id, guard, update).await
    }

    pub async fn find_stale(&self, now: i64, lease_ms: i64) -> Result<Vec<JobRow>, StoreError> {
        jobs::find_stale(&self.pool, now, lease_ms).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<JobRow>, StoreError> {
        jobs::get(&self.pool, id).await
    }

    pub async fn list(
        &self,
        state: Option<JobState>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<JobRow>, StoreError> {
        jobs::list(&self.pool, state, limit, offset).await
    }

    /// Counts for every known state, zero-filled, in [`JobState::ALL`] order.
    pub async fn count_by_state(&self) -> Result<Vec<(JobState, i64)>, StoreError> {
        let raw = jobs::count_by_state(&self.pool).await?;
        let mut counts: Vec<(JobState, i64)> = JobState::ALL.iter().map(|s| (*s, 0)).collect();
        for (state, n) in raw {
            let parsed: JobState = state
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("state column: {e}")))?;
            if let Some(slot) = counts.iter_mut().find(|(s, _)| *s == parsed) {
                slot.1 += n;
            }
        }
        Ok(counts)
    }

    pub async fn read_config(&self) -> Result<Vec<ConfigRow>, StoreError> {
        queue_config::read_all(&self.pool).await
    }

    pub async fn write_config(&self, key: &str, value: i64, now: i64) -> Result<(), StoreError> {
        queue_config::write(&self.pool, key, value, now).await
    }

    pub async fn register_worker(&self, worker: &WorkerRow) -> Result<(), StoreError> {
        workers::register(&self.pool, worker).await
    }

    pub async fn heartbeat_worker(&self, id: &str, now: i64) -> Result<bool, StoreError> {
        workers::heartbeat(&self.pool, id, now).await
    }

    pub async fn deregister_worker(&self, id: &str) -> Result<(), StoreError> {
        workers::deregister(&self.pool, id).await
    }

    pub async fn list_workers(&self) -> Result<Vec<WorkerRow>, StoreError> {
        workers::list(&self.pool).await
    }

    pub async fn request_stop_all(&self) -> Result<u64, StoreError> {
        workers::request_stop_all(&self.pool).await
    }

    pub async fn stop_requested(&self, id: &str) -> Result<bool, StoreError> {
        workers::stop_requested(&self.pool, id).await
    }

    pub async fn prune_workers(&self, before: i64) -> Result<u64, StoreError> {
        workers::prune_stale(&self.pool, before).await
    }
}
