//! Application context: unified state passed to every command handler.

use std::path::PathBuf;

use anyhow::Result;

use crate::infra::{
    FileStore, JsonlAuditLog, ProvisionerConfig, SocketProvisionerClient, StagingConfig,
    StagingDirEnvStager,
};
use crate::output::{HumanRenderer, OutputContext, TerminalReporter};

/// Whether results are printed as tables or as one JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Tables and detail views (default).
    Human,
    /// One JSON document on stdout; errors as `{"error":true,...}`.
    Json,
}

/// Global output switches from the command line.
pub struct OutputFlags {
    pub no_color: bool,
    pub quiet: bool,
    pub json: bool,
}

/// Everything `AppContext::new` needs from the parsed command line.
pub struct AppFlags {
    pub output: OutputFlags,
    /// Directory holding `provisioning.json` and `audit.jsonl`.
    pub data_dir: PathBuf,
    /// Operator identity recorded on every mutation.
    pub actor: Option<String>,
}

/// Store, audit log and output settings shared by every `mc-admin` command.
pub struct AppContext {
    /// Terminal output context. Quiet whenever JSON mode is on, so progress
    /// lines never mix with the JSON document on stdout.
    pub output: OutputContext,
    pub mode: OutputMode,
    /// Tenant registry and job store.
    pub store: FileStore,
    pub audit: JsonlAuditLog,
    pub actor: String,
    /// When `true`, prompts are not shown and return their default.
    ///
    /// Set when the `CI` environment variable is present.
    pub non_interactive: bool,
}

impl AppContext {
    #[must_use]
    pub fn new(flags: AppFlags) -> Self {
        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        Self {
            output: OutputContext::new(
                flags.output.no_color,
                flags.output.quiet || flags.output.json,
            ),
            mode,
            store: FileStore::in_dir(&flags.data_dir),
            audit: JsonlAuditLog::in_dir(&flags.data_dir),
            actor: flags.actor.unwrap_or_default(),
            non_interactive: std::env::var("CI").is_ok(),
        }
    }

    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    #[must_use]
    pub fn human(&self) -> HumanRenderer<'_> {
        HumanRenderer::new(&self.output)
    }

    /// Daemon client from `MC_PROVISIONER_SOCKET` / `MC_PROVISIONER_TOKEN`.
    ///
    /// # Errors
    ///
    /// Fails when the token is missing or the environment does not parse.
    pub fn provisioner_client(&self) -> Result<SocketProvisionerClient> {
        let config = ProvisionerConfig::from_env()?;
        let token = config.require_token()?.to_string();
        tracing::debug!(?config, "provisioner client configured");
        Ok(SocketProvisionerClient::new(config.socket, token))
    }

    /// Env stager writing into `MC_ENV_STAGING_DIR`.
    ///
    /// # Errors
    ///
    /// Fails when the environment does not parse.
    pub fn env_stager(&self) -> Result<StagingDirEnvStager> {
        let config = StagingConfig::from_env()?;
        Ok(StagingDirEnvStager::new(config.env_staging_dir))
    }

    /// Yes/no prompt for destructive requests such as decommission.
    ///
    /// When `non_interactive` is `true`, returns `default` immediately.
    ///
    /// # Errors
    ///
    /// Fails when the prompt cannot be shown, for instance without a TTY.
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }
}
