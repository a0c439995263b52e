use std::io::Write;
use std::sync::Arc;

use queuectl_job_queue::CommandRunner;
use queuectl_worker::{
    shutdown_signal, wait_for_shutdown_signal, ShellCommandRunner, WorkerPool,
};
use tokio::sync::watch;

use crate::config_helpers::pool_options_from_config;
use crate::error::CliError;
use crate::state::AppState;

/// `worker start --count N`: runs in the foreground until Ctrl+C, SIGTERM or `worker stop`.
pub async fn start(state: &AppState, count: u32, out: &mut dyn Write) -> Result<(), CliError> {
    let (tx, rx) = shutdown_signal();
    let signals = tokio::spawn(wait_for_shutdown_signal(tx));
    let result = run_pool(state, count, Arc::new(ShellCommandRunner::new()), rx, out).await;
    // Resolves on its own once the pool drops every receiver.
    if let Err(e) = signals.await {
        tracing::debug!(error = %e, "signal listener ended abnormally");
    }
    result
}

/// Run `count` workers with `runner` until `shutdown` fires or the stop flag is set.
pub async fn run_pool(
    state: &AppState,
    count: u32,
    runner: Arc<dyn CommandRunner>,
    shutdown: watch::Receiver<bool>,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    writeln!(
        out,
        "Starting {count} worker(s). Press Ctrl+C or run `queuectl worker stop` to stop gracefully."
    )?;
    out.flush()?;

    let pool = WorkerPool::new(
        state.queue.clone(),
        runner,
        pool_options_from_config(&state.config),
    );
    let summary = pool.run(count as usize, shutdown).await?;

    writeln!(
        out,
        "[OK] {} worker(s) stopped: {} succeeded, {} failed",
        summary.workers, summary.totals.succeeded, summary.totals.failed
    )?;
    if summary.totals.stale_reports > 0 {
        writeln!(
            out,
            "     {} report(s) discarded because the job was reclaimed first",
            summary.totals.stale_reports
        )?;
    }
    Ok(())
}

/// `worker stop`: flags every registered worker; each finishes its current job first.
pub async fn stop(state: &AppState, out: &mut dyn Write) -> Result<(), CliError> {
    let flagged = state.queue.request_stop().await?;
    if flagged == 0 {
        writeln!(out, "No workers running")?;
    } else {
        writeln!(out, "[OK] Sent stop request to {flagged} worker(s)")?;
    }
    Ok(())
}
