use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use queuectl::handlers::worker::run_pool;
use queuectl::{dispatch, AppState, Cli, CliError};
use queuectl_config::Config;
use queuectl_job_queue::{JobQueueError, JobState, NoOpRunner};
use queuectl_worker::shutdown_signal;
use tempfile::TempDir;

struct TestApp {
    _dir: TempDir,
    state: AppState,
}

async fn test_app() -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = Config::default();
    config.database.path = dir.path().join("nested").join("jobs.db");
    config.worker.poll_interval_ms = 20;
    let state = AppState::open(config).await.expect("open state");
    TestApp { _dir: dir, state }
}

async fn run(app: &TestApp, args: &[&str]) -> Result<String, CliError> {
    let argv = std::iter::once("queuectl").chain(args.iter().copied());
    let cli = Cli::try_parse_from(argv).expect("parse args");
    let mut out = Vec::new();
    dispatch(&app.state, cli.command, &mut out).await?;
    Ok(String::from_utf8(out).expect("utf8 output"))
}

#[tokio::test]
async fn enqueue_then_show() {
    let app = test_app().await;
    let out = run(&app, &["enqueue", r#"{"id":"job1","command":"echo hi"}"#])
        .await
        .unwrap();
    assert_eq!(out, "[OK] Job 'job1' enqueued\n");

    let out = run(&app, &["show", "job1"]).await.unwrap();
    assert!(out.contains("command:     echo hi"));
    assert!(out.contains("state:       pending"));
    assert!(out.contains("max_retries: (queue default)"));

    let out = run(&app, &["show", "job1", "--json"]).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["id"], "job1");
    assert_eq!(value["state"], "pending");
    assert_eq!(value["attempts"], 0);
}

#[tokio::test]
async fn enqueue_rejects_bad_input() {
    let app = test_app().await;
    let err = run(&app, &["enqueue", "{not json"]).await.unwrap_err();
    assert!(matches!(err, CliError::Queue(JobQueueError::InvalidSpec(_))));

    let err = run(&app, &["enqueue", r#"{"id":"x"}"#]).await.unwrap_err();
    assert!(matches!(err, CliError::Queue(JobQueueError::InvalidSpec(_))));

    run(&app, &["enqueue", r#"{"id":"x","command":"true"}"#])
        .await
        .unwrap();
    let err = run(&app, &["enqueue", r#"{"id":"x","command":"false"}"#])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "job 'x' already exists");

    let job = app.state.queue.get("x").await.unwrap();
    assert_eq!(job.command, "true", "duplicate must not touch the record");
}

#[tokio::test]
async fn list_filters_by_state() {
    let app = test_app().await;
    assert_eq!(run(&app, &["list"]).await.unwrap(), "No jobs found\n");

    for id in ["a", "b", "c"] {
        let json = format!(r#"{{"id":"{id}","command":"true"}}"#);
        run(&app, &["enqueue", &json]).await.unwrap();
    }
    let job = app.state.queue.claim("w1").await.unwrap().expect("claim");
    app.state.queue.report_success(&job, "w1").await.unwrap();

    let out = run(&app, &["list", "--state", "pending"]).await.unwrap();
    assert!(out.starts_with("ID"));
    assert_eq!(out.lines().count(), 4, "header, rule and two jobs");

    let out = run(&app, &["list", "--state", "completed", "--json"])
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    let items = value.as_array().expect("array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], job.id.as_str());

    let out = run(&app, &["list", "--limit", "1", "--offset", "5", "--json"])
        .await
        .unwrap();
    assert_eq!(out.trim(), "[]");

    let out = run(&app, &["list", "--state", "dead"]).await.unwrap();
    assert_eq!(out, "No jobs found with state 'dead'\n");
}

#[tokio::test]
async fn config_get_and_set() {
    let app = test_app().await;
    let out = run(&app, &["config", "get"]).await.unwrap();
    assert_eq!(out, "max-retries: 3\nbackoff-base: 2\nworker-timeout: 300\n");

    let out = run(&app, &["config", "set", "max_retries", "5"]).await.unwrap();
    assert_eq!(out, "[OK] Configuration updated: max-retries = 5\n");
    let out = run(&app, &["config", "get", "max-retries"]).await.unwrap();
    assert_eq!(out, "max-retries: 5\n");

    let err = run(&app, &["config", "set", "backoff-base", "0"])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CliError::Queue(JobQueueError::InvalidSetting { .. })
    ));
    let err = run(&app, &["config", "get", "colour"]).await.unwrap_err();
    assert!(matches!(err, CliError::Queue(JobQueueError::UnknownSetting(_))));
}

#[tokio::test]
async fn dlq_list_and_retry() {
    let app = test_app().await;
    run(&app, &["enqueue", r#"{"id":"doomed","command":"false","max_retries":0}"#])
        .await
        .unwrap();
    assert_eq!(run(&app, &["dlq", "list"]).await.unwrap(), "DLQ is empty\n");

    let job = app.state.queue.claim("w1").await.unwrap().expect("claim");
    app.state
        .queue
        .report_failure(&job, "w1", queuectl_job_queue::FailureReason::NonZeroExit(1))
        .await
        .unwrap();

    let out = run(&app, &["dlq", "list"]).await.unwrap();
    assert!(out.contains("doomed"));
    assert!(out.contains("command exited with code 1"));

    let err = run(&app, &["dlq", "retry", "missing"]).await.unwrap_err();
    assert!(matches!(err, CliError::Queue(JobQueueError::NotFound(_))));

    let out = run(&app, &["dlq", "retry", "doomed"]).await.unwrap();
    assert_eq!(out, "[OK] Job 'doomed' moved back to the queue\n");
    let job = app.state.queue.get("doomed").await.unwrap();
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.attempts, 0);

    let err = run(&app, &["dlq", "retry", "doomed"]).await.unwrap_err();
    assert!(matches!(err, CliError::Queue(JobQueueError::NotInDlq { .. })));
}

#[tokio::test]
async fn status_counts_jobs_and_workers() {
    let app = test_app().await;
    run(&app, &["enqueue", r#"{"id":"a","command":"true"}"#])
        .await
        .unwrap();
    app.state
        .queue
        .register_worker("worker-test-1", 4242, Some("box".into()))
        .await
        .unwrap();

    let out = run(&app, &["status"]).await.unwrap();
    assert!(out.contains("  Pending:    1"));
    assert!(out.contains("  Total:      1"));
    assert!(out.contains("Active Workers: 1"));
    assert!(out.contains("worker-test-1  pid=4242  host=box"));

    let out = run(&app, &["worker", "stop"]).await.unwrap();
    assert_eq!(out, "[OK] Sent stop request to 1 worker(s)\n");
    let out = run(&app, &["status"]).await.unwrap();
    assert!(out.contains("(stopping)"));
}

#[tokio::test]
async fn worker_stop_without_workers() {
    let app = test_app().await;
    assert_eq!(
        run(&app, &["worker", "stop"]).await.unwrap(),
        "No workers running\n"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_pool_drains_queue_until_stopped() {
    let app = test_app().await;
    for id in ["a", "b", "c"] {
        let json = format!(r#"{{"id":"{id}","command":"true"}}"#);
        run(&app, &["enqueue", &json]).await.unwrap();
    }

    let (_tx, rx) = shutdown_signal();
    let mut out = Vec::new();
    let queue = app.state.queue.clone();
    let stopper = async move {
        loop {
            if queue.stats().await.unwrap().completed == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        queue.request_stop().await.unwrap();
    };

    let (result, ()) = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(
            run_pool(&app.state, 1, Arc::new(NoOpRunner::new()), rx, &mut out),
            stopper
        )
    })
    .await
    .expect("pool stops after the stop request");
    result.unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("Starting 1 worker(s)."));
    assert!(text.contains("[OK] 1 worker(s) stopped: 3 succeeded, 0 failed"));
}
