//! Runs validated invocations and applies the narrow retry policy.

use std::time::Duration;

use mc_common::protocol::{CommandResult, TIMEOUT_EXIT_CODE, effective_timeout};
use tracing::{debug, warn};

use crate::runner::{CommandRunner, RunOutcome};
use crate::validator::Invocation;

/// Which command is retried, how often, and on what failure text.
///
/// Only concurrent `useradd` calls contending for the passwd lock are known
/// to fail transiently; every other command runs exactly once.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub command: &'static str,
    pub max_attempts: u32,
    pub delay: Duration,
    pub transient_marker: &'static str,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            command: "useradd",
            max_attempts: 6,
            delay: Duration::from_millis(800),
            transient_marker: "cannot lock /etc/passwd",
        }
    }
}

impl RetryPolicy {
    fn attempts_for(&self, program: &str) -> u32 {
        if program == self.command {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    fn is_transient(&self, result: &CommandResult) -> bool {
        if result.ok || result.code == Some(TIMEOUT_EXIT_CODE) || result.code.is_none() {
            return false;
        }
        [&result.stderr, &result.stdout]
            .into_iter()
            .flatten()
            .any(|text| text.contains(self.transient_marker))
    }
}

/// Executes allow-listed invocations. Holds no per-request state.
pub struct Executor<R> {
    runner: R,
    retry: RetryPolicy,
}

impl<R: CommandRunner> Executor<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self::with_retry_policy(runner, RetryPolicy::default())
    }

    #[must_use]
    pub fn with_retry_policy(runner: R, retry: RetryPolicy) -> Self {
        Self { runner, retry }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run `invocation`, enforcing `max(1000, timeout_ms)` per attempt.
    pub async fn execute(&self, invocation: &Invocation, timeout_ms: Option<u64>) -> CommandResult {
        let timeout = effective_timeout(timeout_ms);
        let max_attempts = self.retry.attempts_for(invocation.program);

        let mut attempt = 1;
        loop {
            let result = self.run_once(invocation, timeout).await;
            if attempt >= max_attempts || !self.retry.is_transient(&result) {
                return result;
            }
            warn!(
                program = invocation.program,
                attempt,
                max_attempts,
                delay_ms = u64::try_from(self.retry.delay.as_millis()).unwrap_or(u64::MAX),
                "transient failure, retrying"
            );
            tokio::time::sleep(self.retry.delay).await;
            attempt += 1;
        }
    }

    async fn run_once(&self, invocation: &Invocation, timeout: Duration) -> CommandResult {
        match self
            .runner
            .run(invocation.program, &invocation.args, timeout)
            .await
        {
            Ok(RunOutcome::Exited {
                code,
                stdout,
                stderr,
            }) => {
                debug!(program = invocation.program, code, "command exited");
                CommandResult::from_exit(code, lossy(stdout), lossy(stderr))
            }
            Ok(RunOutcome::TimedOut { stdout, stderr }) => {
                warn!(
                    program = invocation.program,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "command killed on timeout"
                );
                CommandResult::timed_out(timeout, lossy(stdout), lossy(stderr))
            }
            Err(e) => {
                warn!(program = invocation.program, error = %format!("{e:#}"), "spawn failed");
                CommandResult::spawn_failed(format!("{e:#}"))
            }
        }
    }
}

fn lossy(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}
