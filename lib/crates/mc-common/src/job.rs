//! Provisioning job records and the job status machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::CommandResult;

/// Kind of infrastructure operation a job performs against one tenant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Bootstrap,
    Update,
    Decommission,
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bootstrap => "bootstrap",
            Self::Update => "update",
            Self::Decommission => "decommission",
        })
    }
}

/// Lifecycle status of a provisioning job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    AwaitingApproval,
    Approved,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Rejected,
}

/// Something that moves a job from one status to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    Submit,
    Approve,
    Reject,
    Start,
    Succeed,
    Fail,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} a job that is {from}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub action: JobAction,
}

impl JobStatus {
    /// Terminal jobs never change again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Cancelled | Self::Rejected
        )
    }

    /// Apply `action`, returning the next status or the refused transition.
    pub fn apply(self, action: JobAction) -> Result<Self, InvalidTransition> {
        use JobAction as A;
        use JobStatus as S;

        let next = match (self, action) {
            (S::Queued, A::Submit) => S::AwaitingApproval,
            (S::Queued | S::AwaitingApproval, A::Approve) => S::Approved,
            (S::Queued | S::AwaitingApproval, A::Reject) => S::Rejected,
            (S::Approved, A::Start) => S::Running,
            (S::Running, A::Succeed) => S::Succeeded,
            (S::Running, A::Fail) => S::Failed,
            (from, A::Cancel) if !from.is_terminal() => S::Cancelled,
            (from, action) => return Err(InvalidTransition { from, action }),
        };
        Ok(next)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Approved => "approved",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s {
            "queued" => Self::Queued,
            "awaiting_approval" => Self::AwaitingApproval,
            "approved" => Self::Approved,
            "running" => Self::Running,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            "rejected" => Self::Rejected,
            other => return Err(format!("unknown job status '{other}'")),
        };
        Ok(status)
    }
}

impl fmt::Display for JobAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Start => "run",
            Self::Succeed => "succeed",
            Self::Fail => "fail",
            Self::Cancel => "cancel",
        })
    }
}

/// One planned command. Structurally a `CommandRequest` minus token and dry-run flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanStep {
    pub title: String,
    pub command: String,
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl PlanStep {
    pub fn new<I, S>(title: impl Into<String>, command: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: title.into(),
            command: command.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            timeout_ms: None,
        }
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// `command arg1 arg2 ...`, for display only.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Outcome of one executed plan step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepRecord {
    /// 1-based position in the plan.
    pub step: usize,
    pub command: String,
    pub args: Vec<String>,
    pub result: CommandResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Append-only audit trail entry stored on the job itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobEvent {
    pub at: DateTime<Utc>,
    pub actor: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One infrastructure operation against one tenant. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvisioningJob {
    pub id: u64,
    pub tenant_id: u64,
    pub job_type: JobType,
    pub status: JobStatus,
    pub dry_run: bool,
    pub requested_by: String,
    #[serde(default)]
    pub request_json: serde_json::Value,
    pub plan_json: Vec<PlanStep>,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    #[serde(default)]
    pub events: Vec<JobEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProvisioningJob {
    /// Move to the status `action` leads to and append the matching event.
    pub fn transition(
        &mut self,
        action: JobAction,
        actor: &str,
        message: Option<String>,
    ) -> Result<JobStatus, InvalidTransition> {
        let from = self.status;
        let to = from.apply(action)?;
        let now = Utc::now();
        self.status = to;
        self.updated_at = now;
        self.events.push(JobEvent {
            at: now,
            actor: actor.to_string(),
            kind: action.to_string(),
            from: Some(from),
            to: Some(to),
            message,
        });
        Ok(to)
    }

    /// Record a non-transition note (e.g. a step outcome) in the trail.
    pub fn note(&mut self, actor: &str, kind: &str, message: impl Into<String>) {
        let now = Utc::now();
        self.updated_at = now;
        self.events.push(JobEvent {
            at: now,
            actor: actor.to_string(),
            kind: kind.to_string(),
            from: None,
            to: None,
            message: Some(message.into()),
        });
    }
}
