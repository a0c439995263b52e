//! Runs job commands through the platform shell.

use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use queuectl_job_queue::{async_trait, CommandError, CommandRunner};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

/// Bytes of stderr kept for the debug log of a failed command.
const STDERR_TAIL_BYTES: usize = 2048;

/// Runs each command as `sh -c <command>` (`cmd /C` on Windows) in a fresh
/// child process. The child is killed if it outlives its deadline.
///
/// Stdout is discarded. Stderr is drained as it arrives and only its last
/// [`STDERR_TAIL_BYTES`] are kept.
#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    shell: String,
    flag: String,
}

impl Default for ShellCommandRunner {
    fn default() -> Self {
        if cfg!(windows) {
            Self::with_shell("cmd", "/C")
        } else {
            Self::with_shell("sh", "-c")
        }
    }
}

impl ShellCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(shell: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            flag: flag.into(),
        }
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(&self, command: &str, deadline: Duration) -> Result<i32, CommandError> {
        let mut child = Command::new(&self.shell)
            .arg(&self.flag)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CommandError::LaunchFailure(format!("{}: {e}", self.shell)))?;
        let stderr = child.stderr.take();

        // The pipe must be drained while waiting or a chatty child blocks on a full buffer.
        let finished = async {
            let tail = async {
                match stderr {
                    Some(stderr) => read_tail(stderr, STDERR_TAIL_BYTES).await,
                    None => Vec::new(),
                }
            };
            tokio::join!(child.wait(), tail)
        };
        // On timeout `child` is dropped on return, which kills it.
        let (status, tail) = match tokio::time::timeout(deadline, finished).await {
            Ok((status, tail)) => (
                status.map_err(|e| CommandError::LaunchFailure(e.to_string()))?,
                tail,
            ),
            Err(_) => return Err(CommandError::DeadlineExceeded(deadline)),
        };

        let code = exit_code(status);
        if code != 0 {
            debug!(
                exit_code = code,
                stderr = %stderr_tail(&tail),
                "command exited unsuccessfully"
            );
        }
        Ok(code)
    }
}

/// Exit code, or `128 + signal` for a child killed by a signal.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Reads `reader` to EOF, keeping at most the last `limit` bytes.
async fn read_tail<R>(mut reader: R, limit: usize) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(limit);
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend(&buf[..n]);
                let excess = tail.len().saturating_sub(limit);
                tail.drain(..excess);
            }
        }
    }
    tail.into()
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_owned()
}
