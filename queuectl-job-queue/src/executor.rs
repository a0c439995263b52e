//! The command-execution collaborator consumed by workers.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Why a command produced no exit code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("failed to launch command: {0}")]
    LaunchFailure(String),

    #[error("command exceeded its {}s deadline", .0.as_secs())]
    DeadlineExceeded(Duration),
}

/// Runs job commands.
///
/// Implementations must run each command in a fresh process context and must
/// not let it outlive `deadline`; stdout and stderr are the implementation's
/// business.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion and return its exit code.
    async fn run(&self, command: &str, deadline: Duration) -> Result<i32, CommandError>;
}

/// A runner that never launches anything and always reports the same exit code.
#[derive(Debug, Default, Clone)]
pub struct NoOpRunner {
    exit_code: i32,
}

impl NoOpRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exit_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

#[async_trait]
impl CommandRunner for NoOpRunner {
    async fn run(&self, _command: &str, _deadline: Duration) -> Result<i32, CommandError> {
        Ok(self.exit_code)
    }
}
