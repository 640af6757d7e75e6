//! Shared in-memory port implementations for unit tests.
//!
//! Each mock records what the services asked of it so tests can assert on
//! side effects without touching the filesystem or the daemon socket.

#![allow(clippy::expect_used)]

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Result, bail};
use chrono::Utc;
use mc_cli::application::ports::{
    AuditRecord, AuditSink, JobFilter, JobStore, NewTenant, ProgressReporter, ProvisionerClient,
    TenantEnvStager, TenantRegistry,
};
use mc_common::job::{JobStatus, JobType, PlanStep, ProvisioningJob};
use mc_common::protocol::CommandResult;
use mc_common::tenant::{Tenant, TenantStatus};

// ── Job store ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<Vec<ProvisioningJob>>,
}

impl MemoryJobStore {
    pub fn job(&self, id: u64) -> ProvisioningJob {
        self.jobs
            .lock()
            .expect("lock")
            .iter()
            .find(|j| j.id == id)
            .cloned()
            .expect("job exists")
    }

    /// Change status behind the services' back, as a concurrent admin would.
    pub fn force_status(&self, id: u64, status: JobStatus) {
        let mut jobs = self.jobs.lock().expect("lock");
        let job = jobs.iter_mut().find(|j| j.id == id).expect("job exists");
        job.status = status;
    }

    pub fn count(&self) -> usize {
        self.jobs.lock().expect("lock").len()
    }
}

impl JobStore for MemoryJobStore {
    async fn create_job(&self, mut job: ProvisioningJob) -> Result<ProvisioningJob> {
        let mut jobs = self.jobs.lock().expect("lock");
        job.id = jobs.len() as u64 + 1;
        jobs.push(job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: u64) -> Result<Option<ProvisioningJob>> {
        Ok(self.jobs.lock().expect("lock").iter().find(|j| j.id == id).cloned())
    }

    async fn save_job(&self, job: &ProvisioningJob) -> Result<()> {
        let mut jobs = self.jobs.lock().expect("lock");
        let Some(slot) = jobs.iter_mut().find(|j| j.id == job.id) else {
            bail!("unknown job {}", job.id);
        };
        *slot = job.clone();
        Ok(())
    }

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<ProvisioningJob>> {
        Ok(self
            .jobs
            .lock()
            .expect("lock")
            .iter()
            .filter(|j| filter.matches(j))
            .cloned()
            .collect())
    }
}

// ── Tenant registry ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryRegistry {
    tenants: Mutex<Vec<Tenant>>,
}

impl MemoryRegistry {
    pub fn tenant(&self, id: u64) -> Tenant {
        self.tenants
            .lock()
            .expect("lock")
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .expect("tenant exists")
    }

    pub fn set_status(&self, id: u64, status: TenantStatus) {
        let mut tenants = self.tenants.lock().expect("lock");
        tenants.iter_mut().find(|t| t.id == id).expect("tenant exists").status = status;
    }
}

impl TenantRegistry for MemoryRegistry {
    async fn create_tenant(&self, tenant: NewTenant) -> Result<Tenant> {
        let mut tenants = self.tenants.lock().expect("lock");
        let now = Utc::now();
        let created = Tenant {
            id: tenants.len() as u64 + 1,
            slug: tenant.slug,
            linux_user: tenant.linux_user,
            display_name: tenant.display_name,
            status: TenantStatus::Pending,
            latest_job_id: None,
            created_at: now,
            updated_at: now,
        };
        tenants.push(created.clone());
        Ok(created)
    }

    async fn get_tenant(&self, id: u64) -> Result<Option<Tenant>> {
        Ok(self.tenants.lock().expect("lock").iter().find(|t| t.id == id).cloned())
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>> {
        Ok(self.tenants.lock().expect("lock").iter().find(|t| t.slug == slug).cloned())
    }

    async fn save_tenant(&self, tenant: &Tenant) -> Result<()> {
        let mut tenants = self.tenants.lock().expect("lock");
        let Some(slot) = tenants.iter_mut().find(|t| t.id == tenant.id) else {
            bail!("unknown tenant {}", tenant.id);
        };
        *slot = tenant.clone();
        Ok(())
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        Ok(self.tenants.lock().expect("lock").clone())
    }
}

// ── Provisioner ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentStep {
    pub command: String,
    pub args: Vec<String>,
    pub dry_run: bool,
    pub timeout_ms: Option<u64>,
}

/// Answers every step with exit 0, except the 1-based call `fail_at`.
/// With `cancel = Some((store, id, n))`, job `id` is marked cancelled in
/// `store` while call `n` is in flight.
#[derive(Default)]
pub struct ScriptedProvisioner<'a> {
    pub fail_at: Option<usize>,
    pub cancel: Option<(&'a MemoryJobStore, u64, usize)>,
    sent: Mutex<Vec<SentStep>>,
}

impl ScriptedProvisioner<'_> {
    pub fn failing_at(step: usize) -> Self {
        Self {
            fail_at: Some(step),
            ..Self::default()
        }
    }

    pub fn cancelling(store: &MemoryJobStore, id: u64, at_call: usize) -> ScriptedProvisioner<'_> {
        ScriptedProvisioner {
            cancel: Some((store, id, at_call)),
            ..ScriptedProvisioner::default()
        }
    }

    pub fn sent(&self) -> Vec<SentStep> {
        self.sent.lock().expect("lock").clone()
    }
}

impl ProvisionerClient for ScriptedProvisioner<'_> {
    async fn execute(&self, step: &PlanStep, dry_run: bool) -> CommandResult {
        let call = {
            let mut sent = self.sent.lock().expect("lock");
            sent.push(SentStep {
                command: step.command.clone(),
                args: step.args.clone(),
                dry_run,
                timeout_ms: step.timeout_ms,
            });
            sent.len()
        };
        if let Some((store, id, at)) = self.cancel {
            if at == call {
                store.force_status(id, JobStatus::Cancelled);
            }
        }
        if dry_run {
            return CommandResult::dry_run();
        }
        if self.fail_at == Some(call) {
            return CommandResult::from_exit(1, String::new(), "boom".into());
        }
        CommandResult::from_exit(0, String::new(), String::new())
    }
}

// ── Audit / staging / progress ───────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingAudit {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAudit {
    pub fn actions(&self) -> Vec<String> {
        self.records
            .lock()
            .expect("lock")
            .iter()
            .map(|r| r.action.clone())
            .collect()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("lock").clone()
    }
}

impl AuditSink for RecordingAudit {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        self.records.lock().expect("lock").push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStager {
    staged: Mutex<Vec<(String, String)>>,
}

impl MemoryStager {
    pub fn staged(&self) -> Vec<(String, String)> {
        self.staged.lock().expect("lock").clone()
    }
}

impl TenantEnvStager for MemoryStager {
    async fn stage(&self, linux_user: &str, contents: &str) -> Result<PathBuf> {
        self.staged
            .lock()
            .expect("lock")
            .push((linux_user.to_string(), contents.to_string()));
        Ok(PathBuf::from(format!("/staging/{linux_user}.env")))
    }
}

pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn step(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warn(&self, _: &str) {}
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// Register `slug` and store one job for it with the given plan and status.
pub async fn seed_job(
    registry: &MemoryRegistry,
    jobs: &MemoryJobStore,
    slug: &str,
    job_type: JobType,
    plan: Vec<PlanStep>,
    status: JobStatus,
    dry_run: bool,
) -> (Tenant, ProvisioningJob) {
    let tenant = match registry.find_tenant_by_slug(slug).await.expect("lookup") {
        Some(t) => t,
        None => registry
            .create_tenant(NewTenant {
                slug: slug.to_string(),
                linux_user: format!("oc-{slug}"),
                display_name: None,
            })
            .await
            .expect("create tenant"),
    };
    let now = Utc::now();
    let job = jobs
        .create_job(ProvisioningJob {
            id: 0,
            tenant_id: tenant.id,
            job_type,
            status,
            dry_run,
            requested_by: "alice".into(),
            request_json: serde_json::json!({ "slug": slug }),
            plan_json: plan,
            steps: Vec::new(),
            events: Vec::new(),
            approved_by: None,
            decided_at: None,
            rejection_reason: None,
            failed_step: None,
            error: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
        })
        .await
        .expect("create job");
    (tenant, job)
}

pub fn three_steps() -> Vec<PlanStep> {
    vec![
        PlanStep::new("first", "true", Vec::<String>::new()),
        PlanStep::new("second", "systemctl", ["daemon-reload"]),
        PlanStep::new("third", "true", Vec::<String>::new()),
    ]
}
