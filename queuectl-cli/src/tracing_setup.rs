use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::EnvFilter;

/// Initialize tracing from configuration.
///
/// `RUST_LOG` wins over `logging.level`. Logs go to stderr so stdout carries
/// only command output. Calling this twice is harmless; the second call keeps
/// the subscriber that is already installed.
pub fn install_tracing_from_config(cfg: &queuectl_config::LoggingConfig) {
    let env_filter_str = std::env::var("RUST_LOG").unwrap_or_else(|_| cfg.level.clone());
    let env_filter = EnvFilter::try_new(&env_filter_str).unwrap_or_else(|e| {
        eprintln!("invalid log filter '{env_filter_str}': {e}; falling back to 'info'");
        EnvFilter::new("info")
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_timer(ChronoUtc::rfc_3339());

    let installed = if cfg.json {
        builder.json().try_init()
    } else {
        builder.with_target(false).try_init()
    };
    if let Err(e) = installed {
        tracing::debug!(error = %e, "tracing subscriber already installed");
    }
}
