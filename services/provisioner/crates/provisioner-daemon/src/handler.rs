//! Turns one request line into one [`CommandResult`].
//!
//! Order of checks: JSON syntax, token, request shape, allow-list, dry run,
//! execution. Nothing after a failed check runs.

use mc_common::protocol::{CommandRequest, CommandResult};
use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::executor::Executor;
use crate::runner::CommandRunner;
use crate::validator::CommandValidator;

/// Stateless apart from the immutable token digest, validator and executor;
/// shared by every connection task.
pub struct RequestHandler<V, R> {
    token_digest: [u8; 32],
    validator: V,
    executor: Executor<R>,
}

impl<V, R> RequestHandler<V, R>
where
    V: CommandValidator,
    R: CommandRunner,
{
    #[must_use]
    pub fn new(token: &str, validator: V, executor: Executor<R>) -> Self {
        Self {
            token_digest: digest(token),
            validator,
            executor,
        }
    }

    /// Handle one raw request line (without its trailing newline).
    pub async fn handle_line(&self, line: &str) -> CommandResult {
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            info!("request rejected: invalid JSON");
            return CommandResult::invalid_json();
        };

        let token = value.get("token").and_then(Value::as_str).unwrap_or_default();
        if !self.token_matches(token) {
            warn!("request rejected: unauthorized");
            return CommandResult::unauthorized();
        }

        match serde_json::from_value::<CommandRequest>(value) {
            Ok(request) => self.dispatch(&request).await,
            Err(e) => {
                info!(error = %e, "request rejected: invalid shape");
                CommandResult::invalid_request(&e.to_string())
            }
        }
    }

    async fn dispatch(&self, request: &CommandRequest) -> CommandResult {
        let invocation = match self.validator.validate(&request.command, &request.args) {
            Ok(invocation) => invocation,
            Err(rejection) => {
                info!(command = %request.command, reason = %rejection, "request rejected: not allowed");
                return CommandResult::rejected(rejection.to_string());
            }
        };

        if request.dry_run {
            info!(command = invocation.program, args = ?invocation.args, "dry run, not executed");
            return CommandResult::dry_run();
        }

        info!(command = invocation.program, args = ?invocation.args, "executing");
        let result = self.executor.execute(&invocation, request.timeout_ms).await;
        info!(
            command = invocation.program,
            ok = result.ok,
            code = ?result.code,
            "command finished"
        );
        result
    }

    fn token_matches(&self, candidate: &str) -> bool {
        digest(candidate).ct_eq(&self.token_digest).into()
    }
}

fn digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}
