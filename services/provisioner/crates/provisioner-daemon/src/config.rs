//! Daemon configuration from `MC_PROVISIONER_*` environment variables.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "MC_PROVISIONER_";

/// Each field maps to `MC_PROVISIONER_<FIELD>`:
///   - `MC_PROVISIONER_SOCKET`          (default `/run/mc-provisioner.sock`)
///   - `MC_PROVISIONER_TOKEN`           (required, non-empty)
///   - `MC_PROVISIONER_GROUP`           (default `openclaw`)
///   - `MC_PROVISIONER_MAX_CONNECTIONS` (default `64`)
#[derive(Clone, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_socket")]
    pub socket: PathBuf,

    pub token: String,

    /// Group granted access to the socket.
    #[serde(default = "default_group")]
    pub group: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_socket() -> PathBuf {
    PathBuf::from("/run/mc-provisioner.sock")
}

fn default_group() -> String {
    "openclaw".to_string()
}

fn default_max_connections() -> usize {
    64
}

impl DaemonConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Fails if the token is missing or blank, or a value does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Load from explicit `(NAME, value)` pairs.
    ///
    /// # Errors
    ///
    /// Same conditions as [`DaemonConfig::from_env`].
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::prefixed(ENV_PREFIX)
            .from_iter(vars)
            .context("failed to load config from MC_PROVISIONER_* env vars (MC_PROVISIONER_TOKEN is required)")?;
        if config.token.trim().is_empty() {
            bail!("MC_PROVISIONER_TOKEN must not be empty");
        }
        Ok(config)
    }
}

impl fmt::Debug for DaemonConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonConfig")
            .field("socket", &self.socket)
            .field("token", &"<redacted>")
            .field("group", &self.group)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}
