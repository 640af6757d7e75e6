//! Seams between the provisioning services and the outside world: the
//! tenant/job store, the provisioner daemon, the audit trail, env staging
//! and progress output.
//! This file imports only from `crate::domain` and `mc_common`, never from
//! `crate::infra`, `crate::commands`, or `crate::output`.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use mc_common::job::{JobStatus, PlanStep, ProvisioningJob};
use mc_common::protocol::CommandResult;
use mc_common::tenant::Tenant;
use serde::Serialize;

// ── Records ───────────────────────────────────────────────────────────────────

/// Filter for [`JobStore::list_jobs`]. `None` fields match everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobFilter {
    pub tenant_id: Option<u64>,
    pub status: Option<JobStatus>,
}

impl JobFilter {
    #[must_use]
    pub fn matches(&self, job: &ProvisioningJob) -> bool {
        self.tenant_id.is_none_or(|id| job.tenant_id == id)
            && self.status.is_none_or(|s| job.status == s)
    }
}

/// Fields needed to register a tenant; the registry assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub slug: String,
    pub linux_user: String,
    pub display_name: Option<String>,
}

/// One entry in the audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub at: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub job_id: Option<u64>,
    pub tenant_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

// ── Store Ports ───────────────────────────────────────────────────────────────

/// Durable job records. Jobs are never deleted.
#[allow(async_fn_in_trait)]
pub trait JobStore {
    /// Persist a new job, assigning its id. `job.id` is ignored.
    async fn create_job(&self, job: ProvisioningJob) -> Result<ProvisioningJob>;
    /// Fetch a job by id.
    async fn get_job(&self, id: u64) -> Result<Option<ProvisioningJob>>;
    /// Overwrite an existing job. Fails if the id is unknown.
    async fn save_job(&self, job: &ProvisioningJob) -> Result<()>;
    /// Jobs matching `filter`, oldest first.
    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<ProvisioningJob>>;
}

/// Durable tenant records.
#[allow(async_fn_in_trait)]
pub trait TenantRegistry {
    /// Register a tenant in `pending` status.
    async fn create_tenant(&self, tenant: NewTenant) -> Result<Tenant>;
    async fn get_tenant(&self, id: u64) -> Result<Option<Tenant>>;
    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>>;
    /// Overwrite an existing tenant. Fails if the id is unknown.
    async fn save_tenant(&self, tenant: &Tenant) -> Result<()>;
    async fn list_tenants(&self) -> Result<Vec<Tenant>>;
}

// ── Provisioner Port ──────────────────────────────────────────────────────────

/// Sends one plan step to the privileged daemon.
#[allow(async_fn_in_trait)]
pub trait ProvisionerClient {
    /// Execute (or, with `dry_run`, only validate) `step`.
    ///
    /// Never fails: transport problems come back as a failed
    /// [`CommandResult`] so they halt a plan like any other failed step.
    async fn execute(&self, step: &PlanStep, dry_run: bool) -> CommandResult;
}

// ── Audit and Staging Ports ───────────────────────────────────────────────────

/// Receives one record per job transition.
#[allow(async_fn_in_trait)]
pub trait AuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<()>;
}

/// Writes a tenant's env file where the daemon's `cp -f` step picks it up.
#[allow(async_fn_in_trait)]
pub trait TenantEnvStager {
    /// Stage `contents` for `linux_user`, returning the staged path.
    async fn stage(&self, linux_user: &str, contents: &str) -> Result<PathBuf>;
}

// ── Progress ──────────────────────────────────────────────────────────────────

/// Live feedback while a job is queued or run.
pub trait ProgressReporter {
    /// A plan step or staging action is starting.
    fn step(&self, message: &str);
    /// A job was queued or finished successfully.
    fn success(&self, message: &str);
    /// A step failed or the job was cancelled under us.
    fn warn(&self, message: &str);
}
