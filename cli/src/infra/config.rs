//! Client-side configuration from the environment.
//!
//! Socket and token use the same `MC_PROVISIONER_*` names as the daemon so
//! one env file can serve both. The token is only required by commands that
//! actually reach the daemon (`job run`).

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use mc_common::naming::TENANT_ENV_STAGING_DIR;
use serde::Deserialize;

pub const PROVISIONER_PREFIX: &str = "MC_PROVISIONER_";
pub const CLIENT_PREFIX: &str = "MC_";

/// `MC_PROVISIONER_SOCKET` and `MC_PROVISIONER_TOKEN`.
#[derive(Clone, Deserialize)]
pub struct ProvisionerConfig {
    #[serde(default = "default_socket")]
    pub socket: PathBuf,
    #[serde(default)]
    pub token: Option<String>,
}

fn default_socket() -> PathBuf {
    PathBuf::from("/run/mc-provisioner.sock")
}

impl ProvisionerConfig {
    /// # Errors
    ///
    /// Fails if a variable is present but does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// # Errors
    ///
    /// Same conditions as [`ProvisionerConfig::from_env`].
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(PROVISIONER_PREFIX)
            .from_iter(vars)
            .context("failed to load MC_PROVISIONER_* env vars")
    }

    /// The shared secret, which must be set and non-blank.
    ///
    /// # Errors
    ///
    /// Fails when `MC_PROVISIONER_TOKEN` is unset or blank.
    pub fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("MC_PROVISIONER_TOKEN is required to reach the provisioner"))
    }
}

impl fmt::Debug for ProvisionerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionerConfig")
            .field("socket", &self.socket)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// `MC_ENV_STAGING_DIR`.
#[derive(Debug, Clone, Deserialize)]
pub struct StagingConfig {
    #[serde(default = "default_staging_dir")]
    pub env_staging_dir: PathBuf,
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from(TENANT_ENV_STAGING_DIR)
}

impl StagingConfig {
    /// # Errors
    ///
    /// Fails if a variable is present but does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// # Errors
    ///
    /// Same conditions as [`StagingConfig::from_env`].
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(CLIENT_PREFIX)
            .from_iter(vars)
            .context("failed to load MC_* env vars")
    }
}

/// `~/.mission-control`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_data_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(home.join(".mission-control"))
}
