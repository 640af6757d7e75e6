//! Application service: execute an approved job's plan.
//!
//! Steps run strictly in order, one daemon request each. The first failed
//! step halts the plan; already-applied steps are not rolled back. The job is
//! re-read around every step so a cancel issued elsewhere stops the run
//! before its next step.

use anyhow::Result;
use chrono::Utc;
use mc_common::job::{JobAction, JobStatus, JobType, ProvisioningJob, StepRecord};
use mc_common::tenant::TenantStatus;

use crate::application::ports::{
    AuditSink, JobStore, ProgressReporter, ProvisionerClient, TenantRegistry,
};
use crate::application::services::{audit_job, require_actor};
use crate::domain::{JobError, check_plan_len};

/// Run job `id`, which must be `approved`.
///
/// Returns the job in its final state: `succeeded`, `failed` (with
/// `failed_step` and `error` set) or `cancelled`. A failed job is an `Ok`
/// outcome of this function; only guard and store failures are errors.
///
/// # Errors
///
/// Fails without side effects if the actor is blank, the job is unknown, not
/// `approved`, or carries an oversized plan. Store failures mid-run are
/// propagated.
pub async fn run_job(
    jobs: &impl JobStore,
    registry: &impl TenantRegistry,
    client: &impl ProvisionerClient,
    audit: &impl AuditSink,
    reporter: &impl ProgressReporter,
    id: u64,
    actor: &str,
) -> Result<ProvisioningJob> {
    let actor = require_actor(actor)?;
    let mut job = load(jobs, id).await?;
    if job.status != JobStatus::Approved {
        return Err(JobError::NotRunnable {
            id,
            status: job.status,
        }
        .into());
    }
    check_plan_len(&job.plan_json)?;

    job.transition(JobAction::Start, actor, None)
        .map_err(|source| JobError::InvalidTransition { id, source })?;
    job.started_at = Some(Utc::now());
    jobs.save_job(&job).await?;
    audit_job(audit, &job, actor, "run", Some(JobStatus::Approved), None).await?;
    tracing::info!(job_id = id, job_type = %job.job_type, dry_run = job.dry_run, "job started");

    set_tenant_status(registry, &job, running_status(job.job_type)).await?;

    let plan = job.plan_json.clone();
    let total = plan.len();
    for (index, step) in plan.iter().enumerate() {
        let number = index + 1;

        job = load(jobs, id).await?;
        if job.status == JobStatus::Cancelled {
            return finish_cancelled(registry, reporter, job, number).await;
        }

        reporter.step(&format!("[{number}/{total}] {}", step.title));
        let started_at = Utc::now();
        let result = client.execute(step, job.dry_run).await;
        let finished_at = Utc::now();

        job = load(jobs, id).await?;
        job.steps.push(StepRecord {
            step: number,
            command: step.command.clone(),
            args: step.args.clone(),
            result: result.clone(),
            started_at,
            finished_at,
        });

        // A cancel that landed while the step was in flight wins: the step
        // is recorded, but the job is neither failed nor continued.
        if job.status == JobStatus::Cancelled {
            let outcome = if result.ok { "ok" } else { "failed" };
            job.note(
                actor,
                "step",
                format!("step {number} {outcome} after cancel: {}", result.summary()),
            );
            jobs.save_job(&job).await?;
            return finish_cancelled(registry, reporter, job, number + 1).await;
        }

        if !result.ok {
            let summary = result.summary();
            tracing::warn!(job_id = id, step = number, command = %step.command, %summary, "step failed");
            let error = format!("step {number} ({}) failed: {summary}", step.title);
            job.transition(JobAction::Fail, actor, Some(error.clone()))
                .map_err(|source| JobError::InvalidTransition { id, source })?;
            job.failed_step = Some(number);
            job.error = Some(error.clone());
            job.finished_at = Some(Utc::now());
            jobs.save_job(&job).await?;
            audit_job(audit, &job, actor, "fail", Some(JobStatus::Running), Some(error)).await?;
            set_tenant_status(registry, &job, TenantStatus::Error).await?;
            reporter.warn(&format!("[{number}/{total}] {} failed: {summary}", step.title));
            return Ok(job);
        }

        job.note(actor, "step", format!("step {number} ok: {}", step.command_line()));
        jobs.save_job(&job).await?;
    }

    job.transition(JobAction::Succeed, actor, None)
        .map_err(|source| JobError::InvalidTransition { id, source })?;
    job.finished_at = Some(Utc::now());
    jobs.save_job(&job).await?;
    audit_job(audit, &job, actor, "succeed", Some(JobStatus::Running), None).await?;
    set_tenant_status(registry, &job, succeeded_status(job.job_type)).await?;
    tracing::info!(job_id = id, steps = total, "job succeeded");

    let suffix = if job.dry_run { " (dry run)" } else { "" };
    reporter.success(&format!("job {id} succeeded{suffix}"));
    Ok(job)
}

async fn load(jobs: &impl JobStore, id: u64) -> Result<ProvisioningJob> {
    Ok(jobs.get_job(id).await?.ok_or(JobError::NotFound(id))?)
}

/// Steps before `next_step` may have been applied; the tenant is left in
/// `error` so the partial state is visible.
async fn finish_cancelled(
    registry: &impl TenantRegistry,
    reporter: &impl ProgressReporter,
    job: ProvisioningJob,
    next_step: usize,
) -> Result<ProvisioningJob> {
    tracing::info!(job_id = job.id, next_step, "job cancelled while running");
    if next_step > 1 {
        set_tenant_status(registry, &job, TenantStatus::Error).await?;
    }
    reporter.warn(&format!(
        "job {} cancelled; {} of {} steps ran",
        job.id,
        next_step - 1,
        job.plan_json.len()
    ));
    Ok(job)
}

/// Dry runs never touch tenant status.
async fn set_tenant_status(
    registry: &impl TenantRegistry,
    job: &ProvisioningJob,
    status: TenantStatus,
) -> Result<()> {
    if job.dry_run {
        return Ok(());
    }
    if let Some(mut tenant) = registry.get_tenant(job.tenant_id).await? {
        tenant.status = status;
        tenant.latest_job_id = Some(job.id);
        tenant.updated_at = Utc::now();
        registry.save_tenant(&tenant).await?;
    }
    Ok(())
}

fn running_status(job_type: JobType) -> TenantStatus {
    match job_type {
        JobType::Bootstrap => TenantStatus::Provisioning,
        JobType::Update => TenantStatus::Updating,
        JobType::Decommission => TenantStatus::Decommissioning,
    }
}

fn succeeded_status(job_type: JobType) -> TenantStatus {
    match job_type {
        JobType::Bootstrap | JobType::Update => TenantStatus::Active,
        JobType::Decommission => TenantStatus::Decommissioned,
    }
}
