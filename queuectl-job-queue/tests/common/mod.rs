#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use queuectl_db::{DbConnectionConfig, JobStore};
use queuectl_job_queue::{Clock, JobQueueClient, ManualClock};
use tempfile::TempDir;

/// A queue backed by a throwaway on-disk database and a manual clock.
pub struct TestQueue {
    pub dir: TempDir,
    pub queue: JobQueueClient,
    pub clock: ManualClock,
}

pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).expect("valid timestamp")
}

pub async fn test_queue() -> TestQueue {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir).await;
    let clock = ManualClock::new(epoch());
    let queue = JobQueueClient::with_clock(store, Arc::new(clock.clone()));
    TestQueue { dir, queue, clock }
}

pub async fn open_store(dir: &TempDir) -> JobStore {
    let config = DbConnectionConfig::for_path(dir.path().join("jobs.db"));
    JobStore::open(&config).await.expect("open store")
}

impl TestQueue {
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// A second client on the same database and clock, as another process would have.
    pub async fn second_client(&self) -> JobQueueClient {
        let store = open_store(&self.dir).await;
        JobQueueClient::with_clock(store, Arc::new(self.clock.clone()))
    }
}
