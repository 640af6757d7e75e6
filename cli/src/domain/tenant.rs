//! Tenant-facing domain helpers: references, env assignments, env files.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::domain::error::TenantError;

static ENV_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Safety: constant pattern, cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Z_][A-Z0-9_]*$").expect("valid regex")
});

/// How an operator names a tenant on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantRef {
    Id(u64),
    Slug(String),
}

impl TenantRef {
    /// All-digit input is an id; anything else is a slug.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        match input.parse::<u64>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Slug(input.to_string()),
        }
    }
}

impl std::fmt::Display for TenantRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Slug(slug) => f.write_str(slug),
        }
    }
}

/// One `KEY=VALUE` line destined for the tenant's env file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvAssignment {
    pub key: String,
    pub value: String,
}

/// Parse `KEY=VALUE`.
///
/// # Errors
///
/// Returns [`TenantError::InvalidEnv`] for a missing `=`, a key outside
/// `^[A-Z_][A-Z0-9_]*$`, or a value containing a newline or NUL.
pub fn parse_env_assignment(input: &str) -> Result<EnvAssignment, TenantError> {
    let invalid = || TenantError::InvalidEnv(input.to_string());
    let (key, value) = input.split_once('=').ok_or_else(invalid)?;
    if !ENV_KEY_RE.is_match(key) || value.contains(['\n', '\r', '\0']) {
        return Err(invalid());
    }
    Ok(EnvAssignment {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Render a systemd `EnvironmentFile`.
///
/// Keys keep the order of their first occurrence and the value of their last.
/// `OPENCLAW_TENANT` is always the tenant's own slug.
#[must_use]
pub fn render_env_file(slug: &str, vars: &[EnvAssignment]) -> String {
    let mut entries: Vec<(&str, &str)> = Vec::new();
    for var in vars.iter().filter(|v| v.key != "OPENCLAW_TENANT") {
        match entries.iter_mut().find(|(k, _)| *k == var.key) {
            Some(entry) => entry.1 = &var.value,
            None => entries.push((&var.key, &var.value)),
        }
    }

    let mut out = format!("# Managed by mission-control for tenant {slug}\nOPENCLAW_TENANT={slug}\n");
    for (key, value) in entries {
        let _ = writeln!(out, "{key}={value}");
    }
    out
}
