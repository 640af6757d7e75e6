//! `mc-admin job`: inspect, decide on and run provisioning jobs.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Subcommand};
use mc_common::job::{JobStatus, ProvisioningJob};

use crate::app::AppContext;
use crate::application::ports::JobFilter;
use crate::application::services::{job_query, job_runner, job_transitions};
use crate::domain::TenantRef;
use crate::output::JsonRenderer;

#[derive(Subcommand)]
pub enum JobCommand {
    /// List jobs, oldest first
    List(ListArgs),

    /// Show one job with its plan and history
    Show { id: u64 },

    /// Move a queued job to awaiting_approval
    Submit { id: u64 },

    /// Approve a queued or submitted job
    Approve { id: u64 },

    /// Reject a queued or submitted job
    Reject(RejectArgs),

    /// Cancel a job that has not finished
    Cancel { id: u64 },

    /// Execute an approved job's plan through the provisioner
    Run { id: u64 },
}

#[derive(Args)]
pub struct ListArgs {
    /// Only jobs of this tenant (id or slug)
    #[arg(long)]
    pub tenant: Option<String>,

    /// Only jobs in this status
    #[arg(long, value_parser = parse_status)]
    pub status: Option<JobStatus>,
}

#[derive(Args)]
pub struct RejectArgs {
    pub id: u64,

    /// Free-text reason kept in the job history
    #[arg(long)]
    pub reason: Option<String>,
}

fn parse_status(input: &str) -> Result<JobStatus, String> {
    input.parse()
}

/// Exit code is non-zero when `job run` leaves the job `failed`.
///
/// # Errors
///
/// Propagates service and store failures.
pub async fn run(app: &AppContext, command: JobCommand) -> Result<ExitCode> {
    let is_run = matches!(command, JobCommand::Run { .. });
    let job = match command {
        JobCommand::List(args) => return list(app, args).await.map(|()| ExitCode::SUCCESS),
        JobCommand::Show { id } => job_query::get_job(&app.store, id).await?,
        JobCommand::Submit { id } => {
            let job = job_transitions::submit(&app.store, &app.audit, id, &app.actor).await?;
            app.output.success(&format!("job {id} submitted for approval"));
            job
        }
        JobCommand::Approve { id } => {
            let job = job_transitions::approve(&app.store, &app.audit, id, &app.actor).await?;
            app.output.success(&format!("job {id} approved by {}", app.actor.trim()));
            job
        }
        JobCommand::Reject(args) => {
            let id = args.id;
            let job =
                job_transitions::reject(&app.store, &app.audit, id, &app.actor, args.reason).await?;
            app.output.success(&format!("job {id} rejected"));
            job
        }
        JobCommand::Cancel { id } => {
            let job = job_transitions::cancel(&app.store, &app.audit, id, &app.actor).await?;
            app.output.success(&format!("job {id} cancelled"));
            job
        }
        JobCommand::Run { id } => {
            let client = app.provisioner_client()?;
            job_runner::run_job(
                &app.store,
                &app.store,
                &client,
                &app.audit,
                &app.reporter(),
                id,
                &app.actor,
            )
            .await?
        }
    };
    render_job(app, &job)?;
    if is_run && job.status == JobStatus::Failed {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn list(app: &AppContext, args: ListArgs) -> Result<()> {
    let tenant_id = match args.tenant {
        Some(reference) => {
            Some(job_query::get_tenant(&app.store, &TenantRef::parse(&reference)).await?.id)
        }
        None => None,
    };
    let jobs = job_query::list_jobs(
        &app.store,
        JobFilter {
            tenant_id,
            status: args.status,
        },
    )
    .await?;
    if app.is_json() {
        return JsonRenderer::render(&jobs);
    }
    app.human().render_job_list(&jobs);
    Ok(())
}

fn render_job(app: &AppContext, job: &ProvisioningJob) -> Result<()> {
    if app.is_json() {
        return JsonRenderer::render(job);
    }
    app.human().render_job(job);
    Ok(())
}
