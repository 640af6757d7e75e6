//! `mc-admin tenant`: register tenants and queue update/decommission jobs.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};

use crate::app::AppContext;
use crate::application::services::{job_query, tenant_provisioning};
use crate::application::services::tenant_provisioning::{CreateTenant, QueueJob, QueuedJob};
use crate::domain::{EnvAssignment, TenantRef, parse_env_assignment};
use crate::output::JsonRenderer;

#[derive(Subcommand)]
pub enum TenantCommand {
    /// Register a tenant and queue its bootstrap job
    Create(CreateArgs),

    /// List registered tenants
    List,

    /// Show one tenant by id or slug
    Show {
        /// Tenant id or slug
        tenant: String,
    },

    /// Queue an update job, optionally restaging env
    Update(UpdateArgs),

    /// Queue a decommission job
    Decommission(DecommissionArgs),
}

#[derive(Args)]
pub struct CreateArgs {
    /// Tenant slug (lowercase letters, digits and dashes)
    pub slug: String,

    /// Human-friendly name
    #[arg(long)]
    pub display_name: Option<String>,

    /// Env entry for the tenant's gateway, repeatable
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env)]
    pub env: Vec<EnvAssignment>,

    /// Queue the job as a dry run: commands are validated but not executed
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct UpdateArgs {
    pub slug: String,

    /// Env entry for the tenant's gateway, repeatable
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env)]
    pub env: Vec<EnvAssignment>,

    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct DecommissionArgs {
    pub slug: String,

    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

fn parse_env(input: &str) -> Result<EnvAssignment, String> {
    parse_env_assignment(input).map_err(|e| e.to_string())
}

/// # Errors
///
/// Propagates service and store failures.
pub async fn run(app: &AppContext, command: TenantCommand) -> Result<()> {
    match command {
        TenantCommand::Create(args) => create(app, args).await,
        TenantCommand::List => list(app).await,
        TenantCommand::Show { tenant } => show(app, &tenant).await,
        TenantCommand::Update(args) => update(app, args).await,
        TenantCommand::Decommission(args) => decommission(app, args).await,
    }
}

async fn create(app: &AppContext, args: CreateArgs) -> Result<()> {
    let stager = app.env_stager()?;
    let queued = tenant_provisioning::create_tenant(
        &app.store,
        &app.store,
        &stager,
        &app.audit,
        &app.reporter(),
        CreateTenant {
            slug: args.slug,
            display_name: args.display_name,
            env: args.env,
            dry_run: args.dry_run,
            actor: app.actor.clone(),
        },
    )
    .await?;
    render_queued(app, &queued)
}

async fn list(app: &AppContext) -> Result<()> {
    let tenants = job_query::list_tenants(&app.store).await?;
    if app.is_json() {
        return JsonRenderer::render(&tenants);
    }
    app.human().render_tenant_list(&tenants);
    Ok(())
}

async fn show(app: &AppContext, reference: &str) -> Result<()> {
    let tenant = job_query::get_tenant(&app.store, &TenantRef::parse(reference)).await?;
    if app.is_json() {
        return JsonRenderer::render(&tenant);
    }
    app.human().render_tenant(&tenant);
    Ok(())
}

async fn update(app: &AppContext, args: UpdateArgs) -> Result<()> {
    let stager = app.env_stager()?;
    let queued = tenant_provisioning::queue_update(
        &app.store,
        &app.store,
        &stager,
        &app.audit,
        &app.reporter(),
        QueueJob {
            slug: args.slug,
            env: args.env,
            dry_run: args.dry_run,
            actor: app.actor.clone(),
        },
    )
    .await?;
    render_queued(app, &queued)
}

async fn decommission(app: &AppContext, args: DecommissionArgs) -> Result<()> {
    let confirmed = args.yes
        || args.dry_run
        || app.confirm(
            &format!(
                "Queue decommission of '{}'? Its Linux user and home will be removed when the job runs.",
                args.slug
            ),
            false,
        )?;
    if !confirmed {
        bail!("Decommission of '{}' not confirmed. Pass --yes to skip the prompt.", args.slug);
    }
    let queued = tenant_provisioning::queue_decommission(
        &app.store,
        &app.store,
        &app.audit,
        &app.reporter(),
        QueueJob {
            slug: args.slug,
            env: Vec::new(),
            dry_run: args.dry_run,
            actor: app.actor.clone(),
        },
    )
    .await?;
    render_queued(app, &queued)
}

fn render_queued(app: &AppContext, queued: &QueuedJob) -> Result<()> {
    if app.is_json() {
        return JsonRenderer::render(queued);
    }
    app.output.info(&format!(
        "Next: mc-admin job approve {id} && mc-admin job run {id}",
        id = queued.job.id
    ));
    Ok(())
}
