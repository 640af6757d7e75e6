//! Colour palette for job and tenant states (owo-colors stylesheet pattern).

use mc_common::job::JobStatus;
use mc_common::tenant::TenantStatus;
use owo_colors::Style;

/// Styles keyed by what a line says about provisioning, not by colour.
///
/// `Styles::default()` is the plain palette used with `--no-color`,
/// `NO_COLOR` or a non-TTY stdout.
#[derive(Default, Clone, Copy)]
pub struct Styles {
    /// Finished well: job succeeded, tenant active.
    pub done: Style,
    /// Needs operator attention: cancelled jobs, failed steps mid-report.
    pub attention: Style,
    /// Failed or rejected.
    pub failure: Style,
    /// Queued, awaiting a decision, or running.
    pub in_flight: Style,
    pub muted: Style,
    /// Table column titles.
    pub emphasis: Style,
    /// Detail-view section titles.
    pub title: Style,
}

impl Styles {
    #[must_use]
    pub fn colored() -> Self {
        Self {
            done: Style::new().green(),
            attention: Style::new().yellow(),
            failure: Style::new().red(),
            in_flight: Style::new().cyan(),
            muted: Style::new().dimmed(),
            emphasis: Style::new().bold(),
            title: Style::new().bold().cyan(),
        }
    }

    #[must_use]
    pub fn job_status(&self, status: JobStatus) -> Style {
        match status {
            JobStatus::Succeeded => self.done,
            JobStatus::Failed | JobStatus::Rejected => self.failure,
            JobStatus::Cancelled => self.attention,
            JobStatus::Queued
            | JobStatus::AwaitingApproval
            | JobStatus::Approved
            | JobStatus::Running => self.in_flight,
        }
    }

    #[must_use]
    pub fn tenant_status(&self, status: TenantStatus) -> Style {
        match status {
            TenantStatus::Active => self.done,
            TenantStatus::Error => self.failure,
            TenantStatus::Decommissioned => self.muted,
            TenantStatus::Pending
            | TenantStatus::Provisioning
            | TenantStatus::Updating
            | TenantStatus::Decommissioning => self.in_flight,
        }
    }
}
