//! Infrastructure implementation of the `JobStore` and `TenantRegistry` ports.
//!
//! `FileStore` keeps every tenant and job in one JSON document
//! (`provisioning.json`). Each operation loads the document, applies one
//! change and writes it back atomically (temp file + rename, mode 0600) on
//! `tokio::task::spawn_blocking`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use mc_common::job::ProvisioningJob;
use mc_common::tenant::{Tenant, TenantStatus};
use serde::{Deserialize, Serialize};

use crate::application::ports::{JobFilter, JobStore, NewTenant, TenantRegistry};
use crate::infra::atomic;

pub const STORE_FILE: &str = "provisioning.json";

const STORE_FILE_MODE: u32 = 0o600;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    last_tenant_id: u64,
    #[serde(default)]
    last_job_id: u64,
    #[serde(default)]
    tenants: Vec<Tenant>,
    #[serde(default)]
    jobs: Vec<ProvisioningJob>,
}

/// JSON-file store for tenants and jobs.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store at `<data_dir>/provisioning.json`.
    #[must_use]
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::with_path(data_dir.join(STORE_FILE))
    }

    /// Store at an explicit path (used in tests).
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_sync(path: &Path) -> Result<Document> {
        if !path.exists() {
            return Ok(Document::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading store {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing store {}", path.display()))
    }

    fn save_sync(path: &Path, doc: &Document) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(doc).context("serializing store")?;

        let temp_path = path.with_extension("json.tmp");
        atomic::replace(path, &temp_path, content.as_bytes(), STORE_FILE_MODE)
            .with_context(|| format!("saving store {}", path.display()))
    }

    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Document) -> T + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::load_sync(&path).map(f))
            .await
            .context("store read task panicked")?
    }

    async fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Document) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut doc = Self::load_sync(&path)?;
            let out = f(&mut doc)?;
            Self::save_sync(&path, &doc)?;
            Ok(out)
        })
        .await
        .context("store write task panicked")?
    }
}

impl JobStore for FileStore {
    async fn create_job(&self, mut job: ProvisioningJob) -> Result<ProvisioningJob> {
        self.write(move |doc| {
            doc.last_job_id += 1;
            job.id = doc.last_job_id;
            doc.jobs.push(job.clone());
            Ok(job)
        })
        .await
    }

    async fn get_job(&self, id: u64) -> Result<Option<ProvisioningJob>> {
        self.read(move |doc| doc.jobs.into_iter().find(|j| j.id == id)).await
    }

    async fn save_job(&self, job: &ProvisioningJob) -> Result<()> {
        let job = job.clone();
        self.write(move |doc| {
            let Some(slot) = doc.jobs.iter_mut().find(|j| j.id == job.id) else {
                bail!("job {} does not exist in the store", job.id);
            };
            *slot = job;
            Ok(())
        })
        .await
    }

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<ProvisioningJob>> {
        self.read(move |doc| doc.jobs.into_iter().filter(|j| filter.matches(j)).collect())
            .await
    }
}

impl TenantRegistry for FileStore {
    async fn create_tenant(&self, tenant: NewTenant) -> Result<Tenant> {
        self.write(move |doc| {
            if doc.tenants.iter().any(|t| t.slug == tenant.slug) {
                bail!("tenant '{}' already exists in the store", tenant.slug);
            }
            doc.last_tenant_id += 1;
            let now = Utc::now();
            let created = Tenant {
                id: doc.last_tenant_id,
                slug: tenant.slug,
                linux_user: tenant.linux_user,
                display_name: tenant.display_name,
                status: TenantStatus::Pending,
                latest_job_id: None,
                created_at: now,
                updated_at: now,
            };
            doc.tenants.push(created.clone());
            Ok(created)
        })
        .await
    }

    async fn get_tenant(&self, id: u64) -> Result<Option<Tenant>> {
        self.read(move |doc| doc.tenants.into_iter().find(|t| t.id == id)).await
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>> {
        let slug = slug.to_string();
        self.read(move |doc| doc.tenants.into_iter().find(|t| t.slug == slug)).await
    }

    async fn save_tenant(&self, tenant: &Tenant) -> Result<()> {
        let tenant = tenant.clone();
        self.write(move |doc| {
            let Some(slot) = doc.tenants.iter_mut().find(|t| t.id == tenant.id) else {
                bail!("tenant {} does not exist in the store", tenant.id);
            };
            *slot = tenant;
            Ok(())
        })
        .await
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        self.read(|doc| doc.tenants).await
    }
}
