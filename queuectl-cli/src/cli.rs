use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use queuectl_job_queue::{JobState, DEFAULT_LIST_LIMIT};

/// queuectl: a durable background job queue backed by SQLite.
#[derive(Debug, Parser)]
#[command(name = "queuectl", version, about)]
pub struct Cli {
    /// Path to a configuration file (.toml, .yaml, .json). Overrides QUEUECTL_CONFIG_PATH.
    #[arg(short = 'c', long = "config", global = true, value_name = "PATH")]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Enqueue a job, e.g. queuectl enqueue '{"id":"job1","command":"sleep 2"}'
    Enqueue {
        /// Job JSON with `id`, `command` and optional `max_retries`.
        job_json: String,
    },
    /// Run or stop workers.
    #[command(subcommand)]
    Worker(WorkerCommand),
    /// Job counts per state and registered workers.
    Status,
    /// List jobs, most recently updated first.
    List(ListArgs),
    /// Inspect or requeue the dead letter queue.
    #[command(subcommand)]
    Dlq(DlqCommand),
    /// Read or change the queue settings stored with the jobs.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Show one job's full record.
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum WorkerCommand {
    /// Run workers in the foreground until Ctrl+C, SIGTERM or `worker stop`.
    Start {
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,
    },
    /// Ask every registered worker to finish its current job and exit.
    Stop,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only jobs in this state (pending, processing, completed, failed, dead).
    #[arg(long, value_parser = parse_state)]
    pub state: Option<JobState>,
    #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
    pub limit: u32,
    #[arg(long, default_value_t = 0)]
    pub offset: u32,
    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum DlqCommand {
    /// List dead jobs.
    List {
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long)]
        json: bool,
    },
    /// Move a dead job back to pending with a fresh retry budget.
    Retry { id: String },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print one setting, or all of them.
    Get { key: Option<String> },
    /// Change a setting, e.g. queuectl config set max-retries 5
    Set { key: String, value: String },
}

fn parse_state(raw: &str) -> Result<JobState, String> {
    raw.parse::<JobState>().map_err(|e| e.to_string())
}
