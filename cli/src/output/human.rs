//! Human-readable terminal renderer.

use mc_common::job::ProvisioningJob;
use mc_common::tenant::Tenant;
use owo_colors::OwoColorize as _;

use crate::output::OutputContext;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Renders tenants and jobs as terminal tables and detail views.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    pub fn render_tenant_list(&self, tenants: &[Tenant]) {
        if tenants.is_empty() {
            if !self.ctx.quiet {
                println!("No tenants registered. Create one: mc-admin tenant create <slug>");
            }
            return;
        }
        println!(
            "  {}",
            format!("{:<5} {:<28} {:<32} {:<16} {}", "ID", "SLUG", "LINUX USER", "STATUS", "JOB")
                .style(self.ctx.styles.emphasis)
        );
        for t in tenants {
            let job = t.latest_job_id.map_or_else(|| "-".to_string(), |id| id.to_string());
            println!(
                "  {:<5} {:<28} {:<32} {} {job}",
                t.id,
                t.slug,
                t.linux_user,
                pad(&t.status.to_string(), 16).style(self.ctx.styles.tenant_status(t.status)),
            );
        }
    }

    pub fn render_tenant(&self, tenant: &Tenant) {
        self.ctx.header(&format!("Tenant {} (#{})", tenant.slug, tenant.id));
        if let Some(name) = &tenant.display_name {
            self.ctx.kv("Name:      ", name);
        }
        self.ctx.kv("Linux user:", &tenant.linux_user);
        self.ctx.kv(
            "Status:    ",
            &tenant.status.style(self.ctx.styles.tenant_status(tenant.status)).to_string(),
        );
        if let Some(job) = tenant.latest_job_id {
            self.ctx.kv("Latest job:", &job.to_string());
        }
        self.ctx.kv("Created:   ", &tenant.created_at.format(TIME_FORMAT).to_string());
        self.ctx.kv("Updated:   ", &tenant.updated_at.format(TIME_FORMAT).to_string());
    }

    pub fn render_job_list(&self, jobs: &[ProvisioningJob]) {
        if jobs.is_empty() {
            if !self.ctx.quiet {
                println!("No jobs match.");
            }
            return;
        }
        println!(
            "  {}",
            format!(
                "{:<5} {:<7} {:<13} {:<18} {:<8} {}",
                "ID", "TENANT", "TYPE", "STATUS", "DRY RUN", "REQUESTED BY"
            )
            .style(self.ctx.styles.emphasis)
        );
        for job in jobs {
            println!(
                "  {:<5} {:<7} {:<13} {} {:<8} {}",
                job.id,
                job.tenant_id,
                job.job_type.to_string(),
                pad(&job.status.to_string(), 18).style(self.ctx.styles.job_status(job.status)),
                if job.dry_run { "yes" } else { "no" },
                job.requested_by,
            );
        }
    }

    pub fn render_job(&self, job: &ProvisioningJob) {
        let dry = if job.dry_run { " [dry run]" } else { "" };
        self.ctx.header(&format!("Job {} ({}){dry}", job.id, job.job_type));
        self.ctx.kv("Tenant:      ", &job.tenant_id.to_string());
        self.ctx.kv(
            "Status:      ",
            &job.status.style(self.ctx.styles.job_status(job.status)).to_string(),
        );
        self.ctx.kv("Requested by:", &job.requested_by);
        if let Some(approver) = &job.approved_by {
            self.ctx.kv("Approved by: ", approver);
        }
        if let Some(reason) = &job.rejection_reason {
            self.ctx.kv("Rejected:    ", reason);
        }
        if let Some(error) = &job.error {
            self.ctx.kv("Error:       ", &error.style(self.ctx.styles.failure).to_string());
        }

        if self.ctx.quiet {
            return;
        }
        println!();
        self.ctx.header("Plan:");
        for (index, step) in job.plan_json.iter().enumerate() {
            let number = index + 1;
            let marker = match job.steps.iter().find(|s| s.step == number) {
                Some(record) if record.result.ok => "✓".style(self.ctx.styles.done).to_string(),
                Some(_) => "✗".style(self.ctx.styles.failure).to_string(),
                None => "·".style(self.ctx.styles.muted).to_string(),
            };
            println!("  {marker} {number:>2}. {}", step.title);
            println!("        {}", step.command_line().style(self.ctx.styles.muted));
            if let Some(record) = job.steps.iter().find(|s| s.step == number && !s.result.ok) {
                println!("        {}", record.result.summary().style(self.ctx.styles.failure));
            }
        }

        if !job.events.is_empty() {
            println!();
            self.ctx.header("History:");
            for event in &job.events {
                let message = event.message.as_deref().unwrap_or("");
                println!(
                    "  {}  {:<10} {:<12} {message}",
                    event.at.format(TIME_FORMAT).style(self.ctx.styles.muted),
                    event.kind,
                    event.actor,
                );
            }
        }
    }
}

/// Pad before styling so ANSI escapes do not break column widths.
fn pad(text: &str, width: usize) -> String {
    format!("{text:<width$}")
}
