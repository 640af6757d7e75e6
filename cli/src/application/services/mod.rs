//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod job_query;
pub mod job_runner;
pub mod job_transitions;
pub mod tenant_provisioning;

use anyhow::Result;
use chrono::Utc;
use mc_common::job::{JobStatus, ProvisioningJob};

use crate::application::ports::{AuditRecord, AuditSink};
use crate::domain::JobError;

/// Reject blank actor identities.
pub(crate) fn require_actor(actor: &str) -> Result<&str, JobError> {
    let actor = actor.trim();
    if actor.is_empty() {
        return Err(JobError::MissingActor);
    }
    Ok(actor)
}

/// Emit one audit record for `job`.
pub(crate) async fn audit_job(
    audit: &impl AuditSink,
    job: &ProvisioningJob,
    actor: &str,
    action: &str,
    from: Option<JobStatus>,
    detail: Option<String>,
) -> Result<()> {
    audit
        .record(&AuditRecord {
            at: Utc::now(),
            actor: actor.to_string(),
            action: action.to_string(),
            job_id: Some(job.id),
            tenant_id: Some(job.tenant_id),
            from,
            to: Some(job.status),
            detail,
        })
        .await
}
