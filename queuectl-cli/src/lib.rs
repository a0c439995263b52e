//! The `queuectl` command line front end.
//!
//! Parsing lives in [`cli`], one handler per command in [`handlers`], and
//! rendering in [`output`]. Handlers write to any `io::Write`, so the whole
//! surface can be driven from tests without spawning the binary.

pub mod cli;
pub mod config_helpers;
pub mod error;
pub mod handlers;
pub mod output;
pub mod state;
pub mod tracing_setup;

pub use cli::Cli;
pub use error::CliError;
pub use handlers::dispatch;
pub use state::AppState;
