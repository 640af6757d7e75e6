//! Wire format spoken between the admin tooling and `mc-provisioner`.
//!
//! One newline-terminated JSON object per direction per connection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exit code reported when the daemon kills a command that ran too long.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Appended to stderr of a command killed on timeout.
pub const TIMEOUT_MARKER: &str = "[mc-provisioner] command timed out";

/// Floor applied to every caller-supplied timeout.
pub const MIN_TIMEOUT_MS: u64 = 1_000;

/// Timeout used when the request carries none.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Error string returned for a missing or wrong token.
pub const UNAUTHORIZED: &str = "Unauthorized";

/// Error string returned when the request line is not JSON.
pub const INVALID_JSON: &str = "Invalid JSON";

/// Resolve the timeout the daemon actually enforces for a request.
#[must_use]
pub fn effective_timeout(timeout_ms: Option<u64>) -> Duration {
    Duration::from_millis(timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS).max(MIN_TIMEOUT_MS))
}

/// A single command the caller wants the daemon to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub token: String,
}

/// Outcome of one request, as returned on the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde passes a reference
fn is_false(value: &bool) -> bool {
    !*value
}

impl CommandResult {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::failure(UNAUTHORIZED)
    }

    #[must_use]
    pub fn invalid_json() -> Self {
        Self::failure(INVALID_JSON)
    }

    #[must_use]
    pub fn invalid_request(detail: &str) -> Self {
        Self::failure(format!("Invalid request: {detail}"))
    }

    /// Validation rejected the command; nothing was spawned.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::failure(reason)
    }

    /// Dry run: the command passed validation and was not spawned.
    #[must_use]
    pub fn dry_run() -> Self {
        Self {
            ok: true,
            code: Some(0),
            skipped: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_exit(code: i32, stdout: String, stderr: String) -> Self {
        Self {
            ok: code == 0,
            code: Some(code),
            stdout: Some(stdout),
            stderr: Some(stderr),
            ..Self::default()
        }
    }

    /// The daemon killed the process after `timeout`.
    #[must_use]
    pub fn timed_out(timeout: Duration, stdout: String, stderr: String) -> Self {
        let mut stderr = stderr;
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&format!(
            "{TIMEOUT_MARKER} after {}ms",
            timeout.as_millis()
        ));
        Self {
            ok: false,
            code: Some(TIMEOUT_EXIT_CODE),
            stdout: Some(stdout),
            stderr: Some(stderr),
            ..Self::default()
        }
    }

    /// The OS refused to start the process (missing binary, EACCES, ...).
    #[must_use]
    pub fn spawn_failed(detail: impl Into<String>) -> Self {
        Self::failure(detail)
    }

    /// The caller could not reach the daemon or read its answer.
    #[must_use]
    pub fn transport_failed(detail: impl Into<String>) -> Self {
        Self::failure(detail)
    }

    /// Human-readable one-line summary, used in job errors and CLI output.
    #[must_use]
    pub fn summary(&self) -> String {
        if let Some(error) = &self.error {
            return error.clone();
        }
        if self.skipped {
            return "skipped (dry run)".to_string();
        }
        let code = self
            .code
            .map_or_else(|| "?".to_string(), |c| c.to_string());
        let stderr = self.stderr.as_deref().unwrap_or("").trim();
        if stderr.is_empty() {
            format!("exit {code}")
        } else {
            format!("exit {code}: {stderr}")
        }
    }
}
