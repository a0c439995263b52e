//! Shutdown signalling shared by workers, the reaper and the pool.

use tokio::signal;
use tokio::sync::watch;

/// Creates a shutdown channel. Send `true` to ask every holder of a receiver to stop.
pub fn shutdown_signal() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Waits for SIGINT or SIGTERM (Ctrl+C only off Unix), then triggers shutdown.
pub async fn wait_for_shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT, finishing in-flight jobs"),
        () = terminate => tracing::info!("received SIGTERM, finishing in-flight jobs"),
        _ = shutdown_tx.closed() => return,
    }

    if shutdown_tx.send(true).is_err() {
        tracing::debug!("shutdown requested after every worker had already stopped");
    }
}

/// Sleeps for `duration` unless shutdown is requested first. Returns true on shutdown.
pub(crate) async fn sleep_or_shutdown(
    duration: std::time::Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        () = tokio::time::sleep(duration) => false,
        changed = shutdown.changed() => match changed {
            Ok(()) => *shutdown.borrow(),
            // Sender dropped; shutdown can no longer be requested.
            Err(_) => {
                tokio::time::sleep(duration).await;
                false
            }
        },
    }
}
