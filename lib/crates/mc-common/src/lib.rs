pub mod job;
pub mod naming;
pub mod protocol;
pub mod tenant;

pub use job::{JobEvent, JobStatus, JobType, PlanStep, ProvisioningJob, StepRecord};
pub use naming::{is_valid_slug, is_valid_username, linux_user_for_slug};
pub use protocol::{CommandRequest, CommandResult, effective_timeout};
pub use tenant::{Tenant, TenantStatus};
