//! queuectl
//!
//! Entry point: load configuration, install tracing, open the job store and
//! run one command.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use queuectl::tracing_setup::install_tracing_from_config;
use queuectl::{dispatch, AppState, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> anyhow::Result<()> {
    // Resolve config path: CLI > environment variable
    let config_path = args
        .config_path
        .or_else(|| std::env::var_os("QUEUECTL_CONFIG_PATH").map(PathBuf::from));

    let config = queuectl_config::load_config(config_path.as_deref())?;
    queuectl_config::validate_config(&config)?;
    install_tracing_from_config(&config.logging);

    tracing::debug!(
        config_path = ?config_path,
        database = %config.database.path.display(),
        "configuration loaded"
    );

    let state = AppState::open(config).await?;
    let mut stdout = std::io::stdout().lock();
    let result = dispatch(&state, args.command, &mut stdout).await;
    state.close().await;
    result?;
    Ok(())
}
