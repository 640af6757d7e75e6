//! Application service: tenant creation and queuing of update and
//! decommission jobs.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! Nothing here touches the host: jobs are only queued, and run later
//! through [`super::job_runner::run_job`] once approved.

use anyhow::Result;
use chrono::Utc;
use mc_common::job::{JobEvent, JobStatus, JobType, ProvisioningJob};
use mc_common::naming::{is_valid_slug, linux_user_for_slug};
use mc_common::tenant::{Tenant, TenantStatus};
use serde::Serialize;
use serde_json::json;

use crate::application::ports::{
    AuditSink, JobFilter, JobStore, NewTenant, ProgressReporter, TenantEnvStager,
    TenantRegistry,
};
use crate::application::services::{audit_job, require_actor};
use crate::domain::{
    EnvAssignment, JobError, MAX_OPEN_JOBS_PER_TENANT, TenantError, check_plan_len, plan_for,
    render_env_file,
};

/// Input for [`create_tenant`].
#[derive(Debug, Clone, Default)]
pub struct CreateTenant {
    pub slug: String,
    pub display_name: Option<String>,
    pub env: Vec<EnvAssignment>,
    pub dry_run: bool,
    pub actor: String,
}

/// Input for [`queue_update`] and [`queue_decommission`].
#[derive(Debug, Clone, Default)]
pub struct QueueJob {
    pub slug: String,
    pub env: Vec<EnvAssignment>,
    pub dry_run: bool,
    pub actor: String,
}

/// A tenant together with the job just queued for it.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedJob {
    pub tenant: Tenant,
    pub job: ProvisioningJob,
}

/// Register a tenant and queue its bootstrap job.
///
/// A slug already registered is accepted again only while the tenant has no
/// host footprint worth protecting (`pending`, `error` or `decommissioned`)
/// and no open job; a fresh bootstrap job is then queued for the existing
/// record. Env files are staged only for real runs.
///
/// # Errors
///
/// Fails on a blank actor, an invalid slug, a live duplicate, an open job,
/// or any store/staging failure.
pub async fn create_tenant(
    registry: &impl TenantRegistry,
    jobs: &impl JobStore,
    stager: &impl TenantEnvStager,
    audit: &impl AuditSink,
    reporter: &impl ProgressReporter,
    request: CreateTenant,
) -> Result<QueuedJob> {
    let actor = require_actor(&request.actor)?.to_string();
    if !is_valid_slug(&request.slug) {
        return Err(TenantError::InvalidSlug(request.slug).into());
    }
    let linux_user = linux_user_for_slug(&request.slug);
    let plan = plan_for(JobType::Bootstrap, &linux_user);
    check_plan_len(&plan)?;

    let existing = registry.find_tenant_by_slug(&request.slug).await?;
    if let Some(tenant) = &existing {
        if !matches!(
            tenant.status,
            TenantStatus::Pending | TenantStatus::Error | TenantStatus::Decommissioned
        ) {
            return Err(TenantError::AlreadyExists(request.slug).into());
        }
        ensure_no_open_job(jobs, tenant).await?;
    }

    if !request.dry_run {
        reporter.step(&format!("staging env for {linux_user}..."));
        stager
            .stage(&linux_user, &render_env_file(&request.slug, &request.env))
            .await?;
    }

    let mut tenant = match existing {
        Some(mut tenant) => {
            tenant.display_name = request.display_name.clone().or(tenant.display_name);
            tenant.status = TenantStatus::Pending;
            tenant
        }
        None => {
            registry
                .create_tenant(NewTenant {
                    slug: request.slug.clone(),
                    linux_user: linux_user.clone(),
                    display_name: request.display_name.clone(),
                })
                .await?
        }
    };

    let request_json = json!({
        "slug": request.slug,
        "displayName": request.display_name,
        "envKeys": env_keys(&request.env),
        "dryRun": request.dry_run,
    });
    let job = jobs
        .create_job(new_job(&tenant, JobType::Bootstrap, plan, request.dry_run, &actor, request_json))
        .await?;

    tenant.latest_job_id = Some(job.id);
    tenant.updated_at = Utc::now();
    registry.save_tenant(&tenant).await?;
    audit_job(audit, &job, &actor, "create", None, Some(format!("tenant {}", tenant.slug))).await?;

    reporter.success(&format!(
        "tenant '{}' registered; bootstrap job {} queued",
        tenant.slug, job.id
    ));
    Ok(QueuedJob { tenant, job })
}

/// Queue an update job for an active tenant, restaging env when given.
///
/// # Errors
///
/// Fails on a blank actor, an unknown tenant, a tenant that is not `active`
/// or `error`, an open job, or any store/staging failure.
pub async fn queue_update(
    registry: &impl TenantRegistry,
    jobs: &impl JobStore,
    stager: &impl TenantEnvStager,
    audit: &impl AuditSink,
    reporter: &impl ProgressReporter,
    request: QueueJob,
) -> Result<QueuedJob> {
    let actor = require_actor(&request.actor)?.to_string();
    let tenant = find(registry, &request.slug).await?;
    if !matches!(tenant.status, TenantStatus::Active | TenantStatus::Error) {
        return Err(TenantError::WrongStatus {
            slug: tenant.slug,
            status: tenant.status,
            action: "update",
        }
        .into());
    }
    ensure_no_open_job(jobs, &tenant).await?;

    if !request.dry_run && !request.env.is_empty() {
        reporter.step(&format!("restaging env for {}...", tenant.linux_user));
        stager
            .stage(&tenant.linux_user, &render_env_file(&tenant.slug, &request.env))
            .await?;
    }

    let request_json = json!({
        "slug": tenant.slug,
        "envKeys": env_keys(&request.env),
        "dryRun": request.dry_run,
    });
    queue(registry, jobs, audit, reporter, tenant, JobType::Update, &request, &actor, request_json)
        .await
}

/// Queue a decommission job for any tenant not already decommissioned.
///
/// # Errors
///
/// Fails on a blank actor, an unknown or decommissioned tenant, an open
/// job, or any store failure.
pub async fn queue_decommission(
    registry: &impl TenantRegistry,
    jobs: &impl JobStore,
    audit: &impl AuditSink,
    reporter: &impl ProgressReporter,
    request: QueueJob,
) -> Result<QueuedJob> {
    let actor = require_actor(&request.actor)?.to_string();
    let tenant = find(registry, &request.slug).await?;
    if tenant.status == TenantStatus::Decommissioned {
        return Err(TenantError::WrongStatus {
            slug: tenant.slug,
            status: tenant.status,
            action: "decommission",
        }
        .into());
    }
    ensure_no_open_job(jobs, &tenant).await?;

    let request_json = json!({ "slug": tenant.slug, "dryRun": request.dry_run });
    queue(
        registry,
        jobs,
        audit,
        reporter,
        tenant,
        JobType::Decommission,
        &request,
        &actor,
        request_json,
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn queue(
    registry: &impl TenantRegistry,
    jobs: &impl JobStore,
    audit: &impl AuditSink,
    reporter: &impl ProgressReporter,
    mut tenant: Tenant,
    job_type: JobType,
    request: &QueueJob,
    actor: &str,
    request_json: serde_json::Value,
) -> Result<QueuedJob> {
    let plan = plan_for(job_type, &tenant.linux_user);
    check_plan_len(&plan)?;

    let job = jobs
        .create_job(new_job(&tenant, job_type, plan, request.dry_run, actor, request_json))
        .await?;
    tenant.latest_job_id = Some(job.id);
    tenant.updated_at = Utc::now();
    registry.save_tenant(&tenant).await?;
    audit_job(audit, &job, actor, "create", None, Some(format!("tenant {}", tenant.slug))).await?;

    reporter.success(&format!("{job_type} job {} queued for '{}'", job.id, tenant.slug));
    Ok(QueuedJob { tenant, job })
}

async fn find(registry: &impl TenantRegistry, slug: &str) -> Result<Tenant> {
    Ok(registry
        .find_tenant_by_slug(slug)
        .await?
        .ok_or_else(|| TenantError::NotFound(slug.to_string()))?)
}

/// At most [`MAX_OPEN_JOBS_PER_TENANT`] non-terminal jobs per tenant.
async fn ensure_no_open_job(jobs: &impl JobStore, tenant: &Tenant) -> Result<()> {
    let open: Vec<ProvisioningJob> = jobs
        .list_jobs(JobFilter {
            tenant_id: Some(tenant.id),
            status: None,
        })
        .await?
        .into_iter()
        .filter(|j| !j.status.is_terminal())
        .collect();
    if open.len() >= MAX_OPEN_JOBS_PER_TENANT {
        if let Some(job) = open.first() {
            return Err(JobError::OpenJobExists {
                slug: tenant.slug.clone(),
                job_id: job.id,
                status: job.status,
            }
            .into());
        }
    }
    Ok(())
}

fn new_job(
    tenant: &Tenant,
    job_type: JobType,
    plan: Vec<mc_common::job::PlanStep>,
    dry_run: bool,
    actor: &str,
    request_json: serde_json::Value,
) -> ProvisioningJob {
    let now = Utc::now();
    ProvisioningJob {
        id: 0,
        tenant_id: tenant.id,
        job_type,
        status: JobStatus::Queued,
        dry_run,
        requested_by: actor.to_string(),
        request_json,
        plan_json: plan,
        steps: Vec::new(),
        events: vec![JobEvent {
            at: now,
            actor: actor.to_string(),
            kind: "create".to_string(),
            from: None,
            to: Some(JobStatus::Queued),
            message: Some(format!("{job_type} for {}", tenant.slug)),
        }],
        approved_by: None,
        decided_at: None,
        rejection_reason: None,
        failed_step: None,
        error: None,
        created_at: now,
        updated_at: now,
        started_at: None,
        finished_at: None,
    }
}

/// Env values can carry secrets; only key names go into the job record.
fn env_keys(env: &[EnvAssignment]) -> Vec<&str> {
    env.iter().map(|e| e.key.as_str()).collect()
}
