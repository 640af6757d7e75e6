//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, OutputFlags};
use crate::commands;
use crate::domain::{JobError, TenantError};
use crate::infra::default_data_dir;

/// Tenant provisioning administration for mission-control
#[derive(Parser)]
#[command(
    name = "mc-admin",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Directory holding the tenant/job store and audit log [default: ~/.mission-control]
    #[arg(long, global = true, env = "MC_DATA_DIR", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Operator identity recorded on every change
    #[arg(long, global = true, env = "MC_ACTOR")]
    pub actor: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage tenants
    #[command(subcommand)]
    Tenant(commands::tenant::TenantCommand),

    /// Manage provisioning jobs
    #[command(subcommand)]
    Job(commands::job::JobCommand),
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            data_dir,
            actor,
            command,
        } = self;
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => default_data_dir()?,
        };
        tracing::debug!(data_dir = %data_dir.display(), "using data directory");

        let app = AppContext::new(AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            data_dir,
            actor,
        });

        match command {
            Command::Tenant(cmd) => commands::tenant::run(&app, cmd)
                .await
                .map(|()| ExitCode::SUCCESS),
            Command::Job(cmd) => commands::job::run(&app, cmd).await,
        }
    }
}

/// Machine-readable code for the `--json` error object.
#[must_use]
pub fn error_code(error: &anyhow::Error) -> &'static str {
    if let Some(e) = error.downcast_ref::<JobError>() {
        return e.code();
    }
    if let Some(e) = error.downcast_ref::<TenantError>() {
        return e.code();
    }
    "ERROR"
}
