//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod error;
pub mod plan;
pub mod tenant;

pub use error::{JobError, TenantError};
pub use plan::{MAX_OPEN_JOBS_PER_TENANT, MAX_PLAN_STEPS, check_plan_len, plan_for};
pub use tenant::{EnvAssignment, TenantRef, parse_env_assignment, render_env_file};
