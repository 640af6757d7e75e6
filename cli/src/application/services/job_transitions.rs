//! Application service: admin transitions on provisioning jobs.
//!
//! Submit, approve, reject and cancel. Each requires an actor, is checked
//! against the status machine, appends a job event and emits an audit record.
//! Running a job lives in [`super::job_runner`].

use anyhow::Result;
use chrono::Utc;
use mc_common::job::{JobAction, ProvisioningJob};

use crate::application::ports::{AuditSink, JobStore};
use crate::application::services::{audit_job, require_actor};
use crate::domain::JobError;

/// `queued → awaiting_approval`.
///
/// # Errors
///
/// Fails if the actor is blank, the job is unknown, or the job is not queued.
pub async fn submit(
    jobs: &impl JobStore,
    audit: &impl AuditSink,
    id: u64,
    actor: &str,
) -> Result<ProvisioningJob> {
    apply(jobs, audit, id, actor, JobAction::Submit, None).await
}

/// `queued | awaiting_approval → approved`.
///
/// # Errors
///
/// Fails if the actor is blank, the job is unknown, or the job is not
/// waiting for a decision.
pub async fn approve(
    jobs: &impl JobStore,
    audit: &impl AuditSink,
    id: u64,
    actor: &str,
) -> Result<ProvisioningJob> {
    apply(jobs, audit, id, actor, JobAction::Approve, None).await
}

/// `queued | awaiting_approval → rejected`, keeping the optional reason.
///
/// # Errors
///
/// Same conditions as [`approve`].
pub async fn reject(
    jobs: &impl JobStore,
    audit: &impl AuditSink,
    id: u64,
    actor: &str,
    reason: Option<String>,
) -> Result<ProvisioningJob> {
    let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
    apply(jobs, audit, id, actor, JobAction::Reject, reason).await
}

/// Any non-terminal status `→ cancelled`.
///
/// Cancelling a running job stops it before its next step; the step in
/// flight is not interrupted.
///
/// # Errors
///
/// Fails if the actor is blank, the job is unknown, or the job is terminal.
pub async fn cancel(
    jobs: &impl JobStore,
    audit: &impl AuditSink,
    id: u64,
    actor: &str,
) -> Result<ProvisioningJob> {
    apply(jobs, audit, id, actor, JobAction::Cancel, None).await
}

async fn apply(
    jobs: &impl JobStore,
    audit: &impl AuditSink,
    id: u64,
    actor: &str,
    action: JobAction,
    message: Option<String>,
) -> Result<ProvisioningJob> {
    let actor = require_actor(actor)?;
    let mut job = jobs.get_job(id).await?.ok_or(JobError::NotFound(id))?;
    let from = job.status;

    job.transition(action, actor, message.clone())
        .map_err(|source| JobError::InvalidTransition { id, source })?;

    let now = Utc::now();
    match action {
        JobAction::Approve => {
            job.approved_by = Some(actor.to_string());
            job.decided_at = Some(now);
        }
        JobAction::Reject => {
            job.rejection_reason.clone_from(&message);
            job.decided_at = Some(now);
        }
        JobAction::Cancel => job.finished_at = Some(now),
        _ => {}
    }

    jobs.save_job(&job).await?;
    audit_job(audit, &job, actor, &action.to_string(), Some(from), message).await?;
    tracing::info!(job_id = id, %from, to = %job.status, actor, "job transition");
    Ok(job)
}
