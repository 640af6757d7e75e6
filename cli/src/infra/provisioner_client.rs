//! Infrastructure implementation of the `ProvisionerClient` port.
//!
//! `SocketProvisionerClient` speaks the one-line-each-way JSON protocol to
//! `mc-provisioner` over its Unix socket. A fresh connection is used per step.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use mc_common::job::PlanStep;
use mc_common::protocol::{CommandRequest, CommandResult, effective_timeout};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::application::ports::ProvisionerClient;

/// `useradd` may be attempted this many times by the daemon.
const DAEMON_MAX_ATTEMPTS: u32 = 6;

/// Fixed delay the daemon sleeps between `useradd` attempts.
const DAEMON_RETRY_DELAY: Duration = Duration::from_millis(800);

/// Slack on top of the daemon's own worst case.
const TRANSPORT_MARGIN: Duration = Duration::from_secs(5);

/// Client for the provisioner daemon socket.
pub struct SocketProvisionerClient {
    socket: PathBuf,
    token: String,
}

impl SocketProvisionerClient {
    #[must_use]
    pub fn new(socket: PathBuf, token: String) -> Self {
        Self { socket, token }
    }

    /// Longest a well-behaved daemon can take to answer `step`.
    #[must_use]
    pub fn deadline(step: &PlanStep) -> Duration {
        effective_timeout(step.timeout_ms) * DAEMON_MAX_ATTEMPTS
            + DAEMON_RETRY_DELAY * (DAEMON_MAX_ATTEMPTS - 1)
            + TRANSPORT_MARGIN
    }

    async fn round_trip(&self, request: &CommandRequest) -> Result<CommandResult> {
        let mut line = serde_json::to_string(request).context("encoding request")?;
        line.push('\n');

        let stream = UnixStream::connect(&self.socket)
            .await
            .with_context(|| format!("connecting to {}", self.socket.display()))?;
        let (read_half, mut write_half) = stream.into_split();
        write_half
            .write_all(line.as_bytes())
            .await
            .context("sending request")?;
        write_half.flush().await.context("sending request")?;

        let mut reply = String::new();
        let n = BufReader::new(read_half)
            .read_line(&mut reply)
            .await
            .context("reading response")?;
        if n == 0 {
            bail!("daemon closed the connection without answering");
        }
        serde_json::from_str(reply.trim_end()).context("decoding response")
    }
}

impl ProvisionerClient for SocketProvisionerClient {
    async fn execute(&self, step: &PlanStep, dry_run: bool) -> CommandResult {
        let request = CommandRequest {
            command: step.command.clone(),
            args: step.args.clone(),
            dry_run,
            timeout_ms: step.timeout_ms,
            token: self.token.clone(),
        };
        let deadline = Self::deadline(step);
        tracing::debug!(command = %step.command, dry_run, ?deadline, "sending step to provisioner");

        match tokio::time::timeout(deadline, self.round_trip(&request)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!(socket = %self.socket.display(), error = %e, "provisioner request failed");
                CommandResult::transport_failed(format!("provisioner unreachable: {e:#}"))
            }
            Err(_) => CommandResult::transport_failed(format!(
                "provisioner did not answer within {}s",
                deadline.as_secs()
            )),
        }
    }
}
