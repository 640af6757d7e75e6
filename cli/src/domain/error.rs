//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use mc_common::job::{InvalidTransition, JobStatus};
use thiserror::Error;

// ── Job errors ────────────────────────────────────────────────────────────────

/// Errors raised by job transitions, planning and execution.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job {0} not found.")]
    NotFound(u64),

    #[error("Job {id} cannot change status")]
    InvalidTransition {
        id: u64,
        #[source]
        source: InvalidTransition,
    },

    #[error("Job {id} is {status}; only approved jobs can be run. Approve it first: mc-admin job approve {id}")]
    NotRunnable { id: u64, status: JobStatus },

    #[error("An actor is required. Pass --actor or set MC_ACTOR.")]
    MissingActor,

    #[error("Plan has {len} steps; at most {max} are allowed.")]
    PlanTooLong { len: usize, max: usize },

    #[error("Tenant '{slug}' already has open job {job_id} ({status}). Finish or cancel it first.")]
    OpenJobExists {
        slug: String,
        job_id: u64,
        status: JobStatus,
    },
}

// ── Tenant errors ─────────────────────────────────────────────────────────────

/// Errors related to tenant identity and lifecycle.
#[derive(Debug, Error)]
pub enum TenantError {
    #[error("Invalid tenant slug '{0}': must match ^[a-z][a-z0-9-]{{0,26}}[a-z0-9]$")]
    InvalidSlug(String),

    #[error("Tenant '{0}' already exists.")]
    AlreadyExists(String),

    #[error("Tenant '{0}' not found.")]
    NotFound(String),

    #[error("Tenant '{slug}' is {status}; {action} is not possible.")]
    WrongStatus {
        slug: String,
        status: mc_common::TenantStatus,
        action: &'static str,
    },

    #[error("Invalid environment entry '{0}': expected KEY=VALUE with KEY matching ^[A-Z_][A-Z0-9_]*$ and a single-line value")]
    InvalidEnv(String),
}

impl JobError {
    /// Stable machine-readable code used in `--json` error objects.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "JOB_NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::NotRunnable { .. } => "JOB_NOT_RUNNABLE",
            Self::MissingActor => "MISSING_ACTOR",
            Self::PlanTooLong { .. } => "PLAN_TOO_LONG",
            Self::OpenJobExists { .. } => "OPEN_JOB_EXISTS",
        }
    }
}

impl TenantError {
    /// Stable machine-readable code used in `--json` error objects.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSlug(_) => "INVALID_SLUG",
            Self::AlreadyExists(_) => "TENANT_EXISTS",
            Self::NotFound(_) => "TENANT_NOT_FOUND",
            Self::WrongStatus { .. } => "WRONG_TENANT_STATUS",
            Self::InvalidEnv(_) => "INVALID_ENV",
        }
    }
}
