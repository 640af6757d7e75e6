//! Tests for the `job_transitions` application service.

#![allow(clippy::expect_used)]

use mc_cli::application::services::job_transitions::{approve, cancel, reject, submit};
use mc_cli::domain::JobError;
use mc_common::job::{JobStatus, JobType};

use crate::mocks::{MemoryJobStore, MemoryRegistry, RecordingAudit, seed_job, three_steps};

fn fixtures() -> (MemoryRegistry, MemoryJobStore, RecordingAudit) {
    Default::default()
}

async fn queued(registry: &MemoryRegistry, jobs: &MemoryJobStore) -> u64 {
    seed_job(registry, jobs, "acme", JobType::Bootstrap, three_steps(), JobStatus::Queued, false)
        .await
        .1
        .id
}

#[tokio::test]
async fn approve_records_actor_decision_and_audit() {
    let (registry, jobs, audit) = fixtures();
    let id = queued(&registry, &jobs).await;

    let job = approve(&jobs, &audit, id, " bob ").await.expect("approve");

    assert_eq!(job.status, JobStatus::Approved);
    assert_eq!(job.approved_by.as_deref(), Some("bob"));
    assert!(job.decided_at.is_some());
    let event = job.events.last().expect("event");
    assert_eq!(event.actor, "bob");
    assert_eq!(event.kind, "approve");
    assert_eq!(event.from, Some(JobStatus::Queued));
    assert_eq!(event.to, Some(JobStatus::Approved));

    let records = audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, "approve");
    assert_eq!(records[0].job_id, Some(id));
    assert_eq!(jobs.job(id).status, JobStatus::Approved);
}

#[tokio::test]
async fn submit_then_approve() {
    let (registry, jobs, audit) = fixtures();
    let id = queued(&registry, &jobs).await;

    let job = submit(&jobs, &audit, id, "alice").await.expect("submit");
    assert_eq!(job.status, JobStatus::AwaitingApproval);
    let job = approve(&jobs, &audit, id, "bob").await.expect("approve");
    assert_eq!(job.status, JobStatus::Approved);
    assert_eq!(audit.actions(), ["submit", "approve"]);
}

#[tokio::test]
async fn reject_keeps_trimmed_reason() {
    let (registry, jobs, audit) = fixtures();
    let id = queued(&registry, &jobs).await;

    let job = reject(&jobs, &audit, id, "bob", Some("  wrong tenant ".into()))
        .await
        .expect("reject");
    assert_eq!(job.status, JobStatus::Rejected);
    assert_eq!(job.rejection_reason.as_deref(), Some("wrong tenant"));
    assert_eq!(audit.records()[0].detail.as_deref(), Some("wrong tenant"));
}

#[tokio::test]
async fn reject_without_reason_is_allowed() {
    let (registry, jobs, audit) = fixtures();
    let id = queued(&registry, &jobs).await;

    let job = reject(&jobs, &audit, id, "bob", Some("   ".into())).await.expect("reject");
    assert_eq!(job.status, JobStatus::Rejected);
    assert_eq!(job.rejection_reason, None);
}

#[tokio::test]
async fn missing_actor_changes_nothing() {
    let (registry, jobs, audit) = fixtures();
    let id = queued(&registry, &jobs).await;

    let err = approve(&jobs, &audit, id, "").await.expect_err("must refuse");
    assert!(matches!(err.downcast_ref::<JobError>(), Some(JobError::MissingActor)));
    assert_eq!(jobs.job(id).status, JobStatus::Queued);
    assert!(audit.actions().is_empty());
}

#[tokio::test]
async fn invalid_transition_is_reported_and_ignored() {
    let (registry, jobs, audit) = fixtures();
    let id = queued(&registry, &jobs).await;
    reject(&jobs, &audit, id, "bob", None).await.expect("reject");

    let err = approve(&jobs, &audit, id, "bob").await.expect_err("terminal");
    assert!(matches!(
        err.downcast_ref::<JobError>(),
        Some(JobError::InvalidTransition { .. })
    ));
    assert!(format!("{err:#}").contains("cannot approve a job that is rejected"));
    assert_eq!(jobs.job(id).status, JobStatus::Rejected);
    assert_eq!(audit.actions(), ["reject"]);
}

#[tokio::test]
async fn cancel_applies_to_any_open_status() {
    for status in [
        JobStatus::Queued,
        JobStatus::AwaitingApproval,
        JobStatus::Approved,
        JobStatus::Running,
    ] {
        let (registry, jobs, audit) = fixtures();
        let (_, job) =
            seed_job(&registry, &jobs, "acme", JobType::Update, three_steps(), status, false).await;

        let cancelled = cancel(&jobs, &audit, job.id, "alice").await.expect("cancel");
        assert_eq!(cancelled.status, JobStatus::Cancelled, "from {status}");
        assert!(cancelled.finished_at.is_some());
    }
}

#[tokio::test]
async fn cancel_of_finished_job_fails() {
    let (registry, jobs, audit) = fixtures();
    let (_, job) = seed_job(
        &registry,
        &jobs,
        "acme",
        JobType::Update,
        three_steps(),
        JobStatus::Succeeded,
        false,
    )
    .await;
    assert!(cancel(&jobs, &audit, job.id, "alice").await.is_err());
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let jobs = MemoryJobStore::default();
    let err = approve(&jobs, &RecordingAudit::default(), 42, "bob")
        .await
        .expect_err("unknown");
    assert!(matches!(err.downcast_ref::<JobError>(), Some(JobError::NotFound(42))));
}
