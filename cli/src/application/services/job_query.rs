//! Application service: read-only queries over jobs and tenants.

use anyhow::Result;
use mc_common::job::ProvisioningJob;
use mc_common::tenant::Tenant;

use crate::application::ports::{JobFilter, JobStore, TenantRegistry};
use crate::domain::{JobError, TenantError, TenantRef};

/// Jobs matching `filter`, oldest first.
///
/// # Errors
///
/// Propagates store failures.
pub async fn list_jobs(jobs: &impl JobStore, filter: JobFilter) -> Result<Vec<ProvisioningJob>> {
    jobs.list_jobs(filter).await
}

/// # Errors
///
/// Returns [`JobError::NotFound`] for an unknown id.
pub async fn get_job(jobs: &impl JobStore, id: u64) -> Result<ProvisioningJob> {
    Ok(jobs.get_job(id).await?.ok_or(JobError::NotFound(id))?)
}

/// # Errors
///
/// Propagates store failures.
pub async fn list_tenants(registry: &impl TenantRegistry) -> Result<Vec<Tenant>> {
    registry.list_tenants().await
}

/// Look a tenant up by id or slug.
///
/// # Errors
///
/// Returns [`TenantError::NotFound`] when nothing matches.
pub async fn get_tenant(registry: &impl TenantRegistry, reference: &TenantRef) -> Result<Tenant> {
    let found = match reference {
        TenantRef::Id(id) => registry.get_tenant(*id).await?,
        TenantRef::Slug(slug) => registry.find_tenant_by_slug(slug).await?,
    };
    Ok(found.ok_or_else(|| TenantError::NotFound(reference.to_string()))?)
}
