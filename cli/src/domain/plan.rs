//! Plan generation for provisioning jobs.
//!
//! A plan is an ordered list of [`PlanStep`]s, each one command the
//! provisioner daemon will validate and run. Order matters: later steps
//! assume earlier ones succeeded (the user exists before its home is
//! chowned, the unit is installed before it is enabled).

use mc_common::job::{JobType, PlanStep};
use mc_common::naming::{
    CONFIG_TEMPLATE, TENANTS_DIR, UNIT_TARGET, UNIT_TEMPLATE, gateway_service, home_dir,
    openclaw_dir, staged_env_path, tenant_config_path, tenant_env_path, workspace_dir,
};

use crate::domain::error::JobError;

/// Longest plan a job may carry.
pub const MAX_PLAN_STEPS: usize = 32;

/// Non-terminal jobs allowed per tenant at any time.
pub const MAX_OPEN_JOBS_PER_TENANT: usize = 1;

/// `useradd` can wait on the passwd lock; give each attempt more room.
const USERADD_TIMEOUT_MS: u64 = 15_000;

/// Starting the gateway may pull its dependencies on first boot.
const ENABLE_TIMEOUT_MS: u64 = 60_000;

/// Plan for `job_type` against the tenant owned by `user`.
#[must_use]
pub fn plan_for(job_type: JobType, user: &str) -> Vec<PlanStep> {
    match job_type {
        JobType::Bootstrap => bootstrap_plan(user),
        JobType::Update => update_plan(user),
        JobType::Decommission => decommission_plan(user),
    }
}

/// Create the Linux user, lay out directories, install config and unit,
/// copy the staged env file, then enable the gateway.
#[must_use]
pub fn bootstrap_plan(user: &str) -> Vec<PlanStep> {
    let home = home_dir(user);
    vec![
        PlanStep::new("Create Linux user", "useradd", ["-m", "-s", "/bin/bash", user])
            .with_timeout_ms(USERADD_TIMEOUT_MS),
        install_dir("Ensure tenant env directory", "0750", "root", TENANTS_DIR),
        install_dir("Create OpenClaw directory", "0700", user, &openclaw_dir(user)),
        install_dir("Create workspace directory", "0750", user, &workspace_dir(user)),
        copy_config(user),
        PlanStep::new(
            "Install gateway unit template",
            "cp",
            ["-n", UNIT_TEMPLATE, UNIT_TARGET],
        ),
        copy_env(user),
        chown_home(user, &home),
        daemon_reload(),
        systemctl("Enable gateway", "enable", user).with_timeout_ms(ENABLE_TIMEOUT_MS),
    ]
}

/// Refresh env and config, fix ownership, restart through `enable --now`.
#[must_use]
pub fn update_plan(user: &str) -> Vec<PlanStep> {
    vec![
        PlanStep::new("Probe provisioner", "true", Vec::<String>::new()),
        copy_env(user),
        copy_config(user),
        chown_home(user, &home_dir(user)),
        daemon_reload(),
        systemctl("Enable gateway", "enable", user).with_timeout_ms(ENABLE_TIMEOUT_MS),
    ]
}

/// Stop the gateway, remove tenant files, delete the user and its home.
#[must_use]
pub fn decommission_plan(user: &str) -> Vec<PlanStep> {
    vec![
        systemctl("Disable gateway", "disable", user),
        PlanStep::new("Remove tenant env", "rm", ["-f", tenant_env_path(user).as_str()]),
        PlanStep::new("Remove OpenClaw directory", "rm", ["-rf", openclaw_dir(user).as_str()]),
        PlanStep::new("Remove workspace directory", "rm", ["-rf", workspace_dir(user).as_str()]),
        PlanStep::new("Delete Linux user", "userdel", ["-r", user]),
    ]
}

/// Refuse plans longer than [`MAX_PLAN_STEPS`].
///
/// # Errors
///
/// Returns [`JobError::PlanTooLong`] when the plan exceeds the bound.
pub fn check_plan_len(plan: &[PlanStep]) -> Result<(), JobError> {
    if plan.len() > MAX_PLAN_STEPS {
        return Err(JobError::PlanTooLong {
            len: plan.len(),
            max: MAX_PLAN_STEPS,
        });
    }
    Ok(())
}

fn install_dir(title: &str, mode: &str, owner: &str, target: &str) -> PlanStep {
    PlanStep::new(
        title,
        "install",
        ["-d", "-m", mode, "-o", owner, "-g", owner, target],
    )
}

fn copy_config(user: &str) -> PlanStep {
    PlanStep::new(
        "Install OpenClaw config",
        "cp",
        ["-n", CONFIG_TEMPLATE, tenant_config_path(user).as_str()],
    )
}

fn copy_env(user: &str) -> PlanStep {
    PlanStep::new(
        "Install tenant env",
        "cp",
        ["-f", staged_env_path(user).as_str(), tenant_env_path(user).as_str()],
    )
}

fn chown_home(user: &str, home: &str) -> PlanStep {
    PlanStep::new("Fix home ownership", "chown", ["-R", format!("{user}:{user}").as_str(), home])
}

fn daemon_reload() -> PlanStep {
    PlanStep::new("Reload systemd", "systemctl", ["daemon-reload"])
}

fn systemctl(title: &str, verb: &str, user: &str) -> PlanStep {
    PlanStep::new(title, "systemctl", [verb, "--now", gateway_service(user).as_str()])
}
