#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use queuectl_db::{DbConnectionConfig, JobStore};
use queuectl_job_queue::{
    async_trait, CommandError, CommandRunner, JobQueueClient, ManualClock, SystemClock,
};
use tempfile::TempDir;

pub struct TestQueue {
    pub dir: TempDir,
    pub queue: JobQueueClient,
}

/// Queue on a temp database using the wall clock.
pub async fn test_queue() -> TestQueue {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir).await;
    let queue = JobQueueClient::with_clock(store, Arc::new(SystemClock));
    TestQueue { dir, queue }
}

/// Queue on a temp database using a manual clock.
pub async fn manual_queue() -> (TestQueue, ManualClock) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir).await;
    let clock = ManualClock::starting_now();
    let queue = JobQueueClient::with_clock(store, Arc::new(clock.clone()));
    (TestQueue { dir, queue }, clock)
}

pub async fn open_store(dir: &TempDir) -> JobStore {
    JobStore::open(&DbConnectionConfig::for_path(dir.path().join("jobs.db")))
        .await
        .expect("open store")
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached within 5s");
}

/// A command runner driven by a lookup table instead of a shell.
///
/// Commands look like `exit N` or `sleep MS`; anything else launches fine and exits 0.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    pub calls: Mutex<Vec<String>>,
    pub launch_failures: HashMap<String, String>,
}

impl ScriptedRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &str, deadline: Duration) -> Result<i32, CommandError> {
        self.calls.lock().unwrap().push(command.to_owned());
        if let Some(msg) = self.launch_failures.get(command) {
            return Err(CommandError::LaunchFailure(msg.clone()));
        }
        let mut words = command.split_whitespace();
        match (words.next(), words.next().and_then(|n| n.parse::<u64>().ok())) {
            (Some("exit"), Some(code)) => Ok(code as i32),
            (Some("sleep"), Some(ms)) => {
                let wanted = Duration::from_millis(ms);
                if wanted > deadline {
                    tokio::time::sleep(deadline).await;
                    Err(CommandError::DeadlineExceeded(deadline))
                } else {
                    tokio::time::sleep(wanted).await;
                    Ok(0)
                }
            }
            _ => Ok(0),
        }
    }
}
