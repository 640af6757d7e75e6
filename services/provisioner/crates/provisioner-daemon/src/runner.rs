//! Process execution port and its tokio implementation.
//!
//! `TokioCommandRunner` spawns the program directly (never through a shell)
//! and races completion against the timeout with `tokio::select!`, killing
//! the child explicitly when the timeout wins.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::warn;

/// `PATH` given to every spawned command; the daemon's own environment is
/// never inherited.
pub const SAFE_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// How long to keep draining pipes once the child has exited or been killed.
/// A grandchild holding the pipe open must not pin the connection.
const OUTPUT_GRACE: Duration = Duration::from_millis(250);

/// Raw result of one process run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Exited {
        code: i32,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    /// Killed after the timeout; carries whatever output was drained.
    TimedOut { stdout: Vec<u8>, stderr: Vec<u8> },
}

/// Abstracts process execution so the executor can be tested without
/// spawning anything.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, killing it after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process cannot be spawned or waited on.
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<RunOutcome>;
}

/// Production runner.
pub struct TokioCommandRunner {
    path: String,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::with_path(SAFE_PATH)
    }

    /// Use a custom `PATH` for program lookup (used in tests).
    #[must_use]
    pub fn with_path(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<RunOutcome> {
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .env_clear()
            .env("PATH", &self.path)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let mut stdout = drain(child.stdout.take());
        let mut stderr = drain(child.stderr.take());

        tokio::select! {
            status = child.wait() => {
                let status = status.with_context(|| format!("waiting for {program}"))?;
                Ok(RunOutcome::Exited {
                    code: exit_code(status),
                    stdout: collect(&mut stdout).await,
                    stderr: collect(&mut stderr).await,
                })
            }
            () = tokio::time::sleep(timeout) => {
                kill_timed_out(&mut child, program).await;
                Ok(RunOutcome::TimedOut {
                    stdout: collect(&mut stdout).await,
                    stderr: collect(&mut stderr).await,
                })
            }
        }
    }
}

/// Kill a child whose timeout fired. Returns whether the kill went through;
/// a failure is logged, and the pipes are still drained by the caller.
async fn kill_timed_out(child: &mut Child, program: &str) -> bool {
    match child.kill().await {
        Ok(()) => true,
        Err(error) => {
            warn!(program, %error, "failed to kill timed-out process");
            false
        }
    }
}

fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    })
}

async fn collect(handle: &mut JoinHandle<Vec<u8>>) -> Vec<u8> {
    if let Ok(Ok(buf)) = tokio::time::timeout(OUTPUT_GRACE, &mut *handle).await {
        buf
    } else {
        handle.abort();
        Vec::new()
    }
}

/// Exit code, or `128 + signal` for a signalled process.
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}
