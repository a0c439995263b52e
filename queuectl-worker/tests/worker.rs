mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{eventually, manual_queue, test_queue, ScriptedRunner};
use queuectl_job_queue::{JobSpec, JobState};
use queuectl_worker::{
    shutdown_signal, PoolOptions, ReaperOptions, Worker, WorkerError, WorkerOptions, WorkerPool,
};

fn fast_options() -> WorkerOptions {
    WorkerOptions {
        poll_interval: Duration::from_millis(20),
        store_retry_budget: 2,
        heartbeat_interval: Duration::from_millis(50),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_completes_and_fails_jobs_then_stops_on_shutdown() {
    let t = test_queue().await;
    t.queue.enqueue(JobSpec::new("ok", "true")).await.unwrap();
    t.queue
        .enqueue(JobSpec::new("bad", "exit 2").with_max_retries(0))
        .await
        .unwrap();

    let runner = ScriptedRunner::new();
    let worker = Worker::new("w1", t.queue.clone(), runner.clone(), fast_options());
    let (tx, rx) = shutdown_signal();
    let handle = tokio::spawn(worker.run(rx));

    let queue = t.queue.clone();
    eventually(|| {
        let queue = queue.clone();
        async move {
            let stats = queue.stats().await.unwrap();
            stats.completed == 1 && stats.dead == 1
        }
    })
    .await;

    tx.send(true).unwrap();
    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 1);

    let bad = t.queue.get("bad").await.unwrap();
    assert_eq!(bad.last_error.as_deref(), Some("command exited with code 2"));
    let mut calls = runner.calls();
    calls.sort();
    assert_eq!(calls, ["exit 2", "true"]);
    assert!(t.queue.workers().await.unwrap().is_empty(), "worker deregistered");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_finishes_the_in_flight_job() {
    let t = test_queue().await;
    t.queue.enqueue(JobSpec::new("a-slow", "sleep 300")).await.unwrap();
    t.queue.enqueue(JobSpec::new("b-next", "true")).await.unwrap();

    let runner = ScriptedRunner::new();
    let worker = Worker::new("w1", t.queue.clone(), runner.clone(), fast_options());
    let (tx, rx) = shutdown_signal();
    let handle = tokio::spawn(worker.run(rx));

    let queue = t.queue.clone();
    eventually(|| {
        let queue = queue.clone();
        async move { queue.get("a-slow").await.unwrap().state == JobState::Processing }
    })
    .await;
    tx.send(true).unwrap();

    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats.succeeded, 1);
    assert_eq!(t.queue.get("a-slow").await.unwrap().state, JobState::Completed);
    assert_eq!(t.queue.get("b-next").await.unwrap().state, JobState::Pending);
    assert_eq!(runner.calls(), ["sleep 300"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn store_stop_flag_stops_the_worker() {
    let t = test_queue().await;
    let worker = Worker::new("w1", t.queue.clone(), ScriptedRunner::new(), fast_options());
    let (_tx, rx) = shutdown_signal();
    let handle = tokio::spawn(worker.run(rx));

    let queue = t.queue.clone();
    eventually(|| {
        let queue = queue.clone();
        async move { !queue.workers().await.unwrap().is_empty() }
    })
    .await;
    assert_eq!(t.queue.request_stop().await.unwrap(), 1);

    let stats = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker should stop")
        .unwrap()
        .unwrap();
    assert_eq!(stats.processed(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deadline_comes_from_worker_timeout_setting() {
    let t = test_queue().await;
    t.queue.set_setting("worker-timeout", "1").await.unwrap();
    t.queue
        .enqueue(JobSpec::new("hang", "sleep 5000").with_max_retries(0))
        .await
        .unwrap();

    let worker = Worker::new("w1", t.queue.clone(), ScriptedRunner::new(), fast_options());
    let (tx, rx) = shutdown_signal();
    let handle = tokio::spawn(worker.run(rx));

    let queue = t.queue.clone();
    eventually(|| {
        let queue = queue.clone();
        async move { queue.get("hang").await.unwrap().state == JobState::Dead }
    })
    .await;
    tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    let job = t.queue.get("hang").await.unwrap();
    assert_eq!(job.last_error.as_deref(), Some("command timed out after 1s"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn late_report_after_reclaim_is_discarded() {
    let (t, clock) = manual_queue().await;
    t.queue.set_setting("worker-timeout", "3").await.unwrap();
    t.queue.enqueue(JobSpec::new("slow", "sleep 1500")).await.unwrap();

    let worker = Worker::new("w1", t.queue.clone(), ScriptedRunner::new(), fast_options());
    let (tx, rx) = shutdown_signal();
    let handle = tokio::spawn(worker.run(rx));

    let queue = t.queue.clone();
    eventually(|| {
        let queue = queue.clone();
        async move { queue.get("slow").await.unwrap().state == JobState::Processing }
    })
    .await;
    // Lease runs out while the command is still going.
    clock.advance(Duration::from_secs(10));
    let report = t.queue.reclaim_stale().await.unwrap();
    assert_eq!(report.requeued, 1);
    tx.send(true).unwrap();

    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats.stale_reports, 1);
    let job = t.queue.get("slow").await.unwrap();
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.attempts, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn busy_worker_registers_again_after_prune_and_sees_stop() {
    let (t, clock) = manual_queue().await;
    t.queue.enqueue(JobSpec::new("long", "sleep 1500")).await.unwrap();

    let worker = Worker::new("w1", t.queue.clone(), ScriptedRunner::new(), fast_options());
    let (_tx, rx) = shutdown_signal();
    let handle = tokio::spawn(worker.run(rx));

    let queue = t.queue.clone();
    eventually(|| {
        let queue = queue.clone();
        async move { queue.get("long").await.unwrap().state == JobState::Processing }
    })
    .await;
    // Registry row goes stale while the command is still running.
    clock.advance(Duration::from_secs(90));
    t.queue.prune_workers(Duration::from_secs(60)).await.unwrap();

    let queue = t.queue.clone();
    eventually(|| {
        let queue = queue.clone();
        async move { queue.workers().await.unwrap().iter().any(|w| w.id == "w1") }
    })
    .await;
    assert_eq!(t.queue.request_stop().await.unwrap(), 1);

    let stats = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker should stop after its job")
        .unwrap()
        .unwrap();
    assert_eq!(stats.succeeded, 1);
    assert_eq!(t.queue.get("long").await.unwrap().state, JobState::Completed);
}

#[tokio::test]
async fn unreachable_store_is_fatal_after_retry_budget() {
    let t = test_queue().await;
    t.queue.store().close().await;

    let worker = Worker::new("w1", t.queue.clone(), ScriptedRunner::new(), fast_options());
    let (_tx, rx) = shutdown_signal();
    let err = tokio::time::timeout(Duration::from_secs(5), worker.run(rx))
        .await
        .expect("worker should give up")
        .unwrap_err();
    assert!(matches!(err, WorkerError::StoreUnavailable { attempts: 3, .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pool_drains_queue_with_several_workers() {
    let t = test_queue().await;
    for i in 0..12 {
        t.queue
            .enqueue(JobSpec::new(format!("j{i}"), "sleep 10"))
            .await
            .unwrap();
    }

    let runner = ScriptedRunner::new();
    let pool = WorkerPool::new(
        t.queue.clone(),
        runner.clone(),
        PoolOptions {
            worker: fast_options(),
            reaper: ReaperOptions {
                interval: Duration::from_millis(50),
                ..ReaperOptions::default()
            },
        },
    );
    let (tx, rx) = shutdown_signal();
    let handle = tokio::spawn(pool.run(3, rx));

    let queue = t.queue.clone();
    eventually(|| {
        let queue = queue.clone();
        async move { queue.stats().await.unwrap().completed == 12 }
    })
    .await;
    tx.send(true).unwrap();

    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.workers, 3);
    assert_eq!(summary.totals.succeeded, 12);
    assert_eq!(runner.calls().len(), 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pool_stops_when_store_flag_is_set() {
    let t = test_queue().await;
    let pool = WorkerPool::new(
        t.queue.clone(),
        Arc::new(queuectl_job_queue::NoOpRunner::new()),
        PoolOptions {
            worker: fast_options(),
            ..PoolOptions::default()
        },
    );
    let (_tx, rx) = shutdown_signal();
    let handle = tokio::spawn(pool.run(2, rx));

    let queue = t.queue.clone();
    eventually(|| {
        let queue = queue.clone();
        async move { queue.workers().await.unwrap().len() == 2 }
    })
    .await;
    t.queue.request_stop().await.unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("pool should stop")
        .unwrap()
        .unwrap();
    assert_eq!(summary.workers, 2);
}
