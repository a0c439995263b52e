//! One module per command. Each handler writes its report to `out` and
//! returns an error instead of printing it.

pub mod config;
pub mod dlq;
pub mod enqueue;
pub mod list;
pub mod show;
pub mod status;
pub mod worker;

use std::io::Write;

use crate::cli::{Command, ConfigCommand, DlqCommand, WorkerCommand};
use crate::error::CliError;
use crate::state::AppState;

/// Run one parsed command against `state`.
pub async fn dispatch(
    state: &AppState,
    command: Command,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    match command {
        Command::Enqueue { job_json } => enqueue::enqueue(state, &job_json, out).await,
        Command::Worker(WorkerCommand::Start { count }) => worker::start(state, count, out).await,
        Command::Worker(WorkerCommand::Stop) => worker::stop(state, out).await,
        Command::Status => status::status(state, out).await,
        Command::List(args) => list::list(state, &args, out).await,
        Command::Dlq(DlqCommand::List {
            limit,
            offset,
            json,
        }) => dlq::list(state, limit, offset, json, out).await,
        Command::Dlq(DlqCommand::Retry { id }) => dlq::retry(state, &id, out).await,
        Command::Config(ConfigCommand::Get { key }) => {
            config::get(state, key.as_deref(), out).await
        }
        Command::Config(ConfigCommand::Set { key, value }) => {
            config::set(state, &key, &value, out).await
        }
        Command::Show { id, json } => show::show(state, &id, json, out).await,
    }
}
