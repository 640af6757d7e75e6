//! Tests for the `job_runner` application service.

#![allow(clippy::expect_used)]

use mc_cli::application::services::job_runner::run_job;
use mc_cli::domain::{JobError, plan_for};
use mc_common::job::{JobStatus, JobType, PlanStep};
use mc_common::tenant::TenantStatus;

use crate::mocks::{
    MemoryJobStore, MemoryRegistry, NoopReporter, RecordingAudit, ScriptedProvisioner, seed_job,
    three_steps,
};

#[tokio::test]
async fn failing_step_halts_plan_and_records_position() {
    let registry = MemoryRegistry::default();
    let jobs = MemoryJobStore::default();
    let audit = RecordingAudit::default();
    let client = ScriptedProvisioner::failing_at(2);
    let (tenant, job) = seed_job(
        &registry,
        &jobs,
        "acme",
        JobType::Bootstrap,
        three_steps(),
        JobStatus::Approved,
        false,
    )
    .await;

    let finished = run_job(&jobs, &registry, &client, &audit, &NoopReporter, job.id, "alice")
        .await
        .expect("run");

    assert_eq!(finished.status, JobStatus::Failed);
    assert_eq!(finished.failed_step, Some(2));
    let error = finished.error.as_deref().expect("error recorded");
    assert!(error.starts_with("step 2 (second) failed"), "{error}");
    assert!(error.contains("boom"), "{error}");

    let sent: Vec<String> = client.sent().into_iter().map(|s| s.command).collect();
    assert_eq!(sent, ["true", "systemctl"], "step 3 must never be sent");
    assert_eq!(finished.steps.len(), 2);
    assert!(finished.steps[0].result.ok);
    assert!(!finished.steps[1].result.ok);
    assert!(finished.finished_at.is_some());

    assert_eq!(jobs.job(job.id).status, JobStatus::Failed);
    assert_eq!(registry.tenant(tenant.id).status, TenantStatus::Error);
    assert_eq!(audit.actions(), ["run", "fail"]);
}

#[tokio::test]
async fn only_approved_jobs_run() {
    for status in [
        JobStatus::Queued,
        JobStatus::AwaitingApproval,
        JobStatus::Rejected,
        JobStatus::Succeeded,
        JobStatus::Cancelled,
    ] {
        let registry = MemoryRegistry::default();
        let jobs = MemoryJobStore::default();
        let audit = RecordingAudit::default();
        let client = ScriptedProvisioner::default();
        let (tenant, job) =
            seed_job(&registry, &jobs, "acme", JobType::Bootstrap, three_steps(), status, false)
                .await;

        let err = run_job(&jobs, &registry, &client, &audit, &NoopReporter, job.id, "alice")
            .await
            .expect_err("must refuse");
        assert!(
            matches!(err.downcast_ref::<JobError>(), Some(JobError::NotRunnable { .. })),
            "{status}: {err}"
        );
        assert!(client.sent().is_empty(), "{status}: nothing may be sent");
        assert_eq!(jobs.job(job.id).status, status);
        assert_eq!(registry.tenant(tenant.id).status, TenantStatus::Pending);
        assert!(audit.actions().is_empty());
    }
}

#[tokio::test]
async fn blank_actor_is_refused_before_anything_happens() {
    let registry = MemoryRegistry::default();
    let jobs = MemoryJobStore::default();
    let client = ScriptedProvisioner::default();
    let (_, job) = seed_job(
        &registry,
        &jobs,
        "acme",
        JobType::Bootstrap,
        three_steps(),
        JobStatus::Approved,
        false,
    )
    .await;

    let err = run_job(
        &jobs,
        &registry,
        &client,
        &RecordingAudit::default(),
        &NoopReporter,
        job.id,
        "  ",
    )
    .await
    .expect_err("must refuse");
    assert!(matches!(err.downcast_ref::<JobError>(), Some(JobError::MissingActor)));
    assert_eq!(jobs.job(job.id).status, JobStatus::Approved);
    assert!(client.sent().is_empty());
}

#[tokio::test]
async fn successful_bootstrap_activates_tenant() {
    let registry = MemoryRegistry::default();
    let jobs = MemoryJobStore::default();
    let audit = RecordingAudit::default();
    let client = ScriptedProvisioner::default();
    let plan = plan_for(JobType::Bootstrap, "oc-acme");
    let total = plan.len();
    let (tenant, job) =
        seed_job(&registry, &jobs, "acme", JobType::Bootstrap, plan, JobStatus::Approved, false)
            .await;

    let finished = run_job(&jobs, &registry, &client, &audit, &NoopReporter, job.id, "alice")
        .await
        .expect("run");

    assert_eq!(finished.status, JobStatus::Succeeded);
    assert_eq!(finished.failed_step, None);
    assert_eq!(client.sent().len(), total);
    let numbers: Vec<usize> = finished.steps.iter().map(|s| s.step).collect();
    assert_eq!(numbers, (1..=total).collect::<Vec<_>>());
    assert!(client.sent().iter().all(|s| !s.dry_run));

    let tenant = registry.tenant(tenant.id);
    assert_eq!(tenant.status, TenantStatus::Active);
    assert_eq!(tenant.latest_job_id, Some(job.id));
    assert_eq!(audit.actions(), ["run", "succeed"]);
}

#[tokio::test]
async fn successful_decommission_marks_tenant_decommissioned() {
    let registry = MemoryRegistry::default();
    let jobs = MemoryJobStore::default();
    let client = ScriptedProvisioner::default();
    let (tenant, job) = seed_job(
        &registry,
        &jobs,
        "acme",
        JobType::Decommission,
        plan_for(JobType::Decommission, "oc-acme"),
        JobStatus::Approved,
        false,
    )
    .await;

    run_job(&jobs, &registry, &client, &RecordingAudit::default(), &NoopReporter, job.id, "alice")
        .await
        .expect("run");
    assert_eq!(registry.tenant(tenant.id).status, TenantStatus::Decommissioned);
}

#[tokio::test]
async fn dry_run_sends_dry_run_flag_and_leaves_tenant_alone() {
    let registry = MemoryRegistry::default();
    let jobs = MemoryJobStore::default();
    let client = ScriptedProvisioner::default();
    let (tenant, job) = seed_job(
        &registry,
        &jobs,
        "acme",
        JobType::Bootstrap,
        three_steps(),
        JobStatus::Approved,
        true,
    )
    .await;

    let finished =
        run_job(&jobs, &registry, &client, &RecordingAudit::default(), &NoopReporter, job.id, "alice")
            .await
            .expect("run");

    assert_eq!(finished.status, JobStatus::Succeeded);
    assert!(client.sent().iter().all(|s| s.dry_run));
    assert!(finished.steps.iter().all(|s| s.result.skipped));
    let tenant = registry.tenant(tenant.id);
    assert_eq!(tenant.status, TenantStatus::Pending);
    assert_eq!(tenant.latest_job_id, None);
}

#[tokio::test]
async fn cancel_during_step_stops_before_next_step() {
    let registry = MemoryRegistry::default();
    let jobs = MemoryJobStore::default();
    let (tenant, job) = seed_job(
        &registry,
        &jobs,
        "acme",
        JobType::Bootstrap,
        three_steps(),
        JobStatus::Approved,
        false,
    )
    .await;
    let client = ScriptedProvisioner::cancelling(&jobs, job.id, 1);

    let finished =
        run_job(&jobs, &registry, &client, &RecordingAudit::default(), &NoopReporter, job.id, "alice")
            .await
            .expect("run");

    assert_eq!(finished.status, JobStatus::Cancelled);
    assert_eq!(client.sent().len(), 1);
    assert_eq!(jobs.job(job.id).steps.len(), 1, "in-flight step is still recorded");
    assert_eq!(registry.tenant(tenant.id).status, TenantStatus::Error);
}

#[tokio::test]
async fn cancel_during_failing_step_is_not_recorded_as_failure() {
    let registry = MemoryRegistry::default();
    let jobs = MemoryJobStore::default();
    let audit = RecordingAudit::default();
    let (tenant, job) = seed_job(
        &registry,
        &jobs,
        "acme",
        JobType::Bootstrap,
        three_steps(),
        JobStatus::Approved,
        false,
    )
    .await;
    let mut client = ScriptedProvisioner::cancelling(&jobs, job.id, 2);
    client.fail_at = Some(2);

    let finished = run_job(&jobs, &registry, &client, &audit, &NoopReporter, job.id, "alice")
        .await
        .expect("run");

    assert_eq!(finished.status, JobStatus::Cancelled);
    assert_eq!(finished.failed_step, None);
    assert_eq!(finished.error, None);
    assert_eq!(finished.steps.len(), 2);
    assert!(!finished.steps[1].result.ok);
    let last = finished.events.last().expect("event");
    assert_eq!(last.kind, "step");
    assert!(last.message.as_deref().unwrap_or("").contains("step 2 failed after cancel"));

    let stored = jobs.job(job.id);
    assert_eq!(stored.status, JobStatus::Cancelled);
    assert_eq!(stored.failed_step, None);
    assert_eq!(client.sent().len(), 2);
    assert_eq!(audit.actions(), ["run"], "no fail record for a cancelled job");
    assert_eq!(registry.tenant(tenant.id).status, TenantStatus::Error);
}

#[tokio::test]
async fn step_timeouts_reach_the_client() {
    let registry = MemoryRegistry::default();
    let jobs = MemoryJobStore::default();
    let client = ScriptedProvisioner::default();
    let plan = vec![PlanStep::new("slow", "true", Vec::<String>::new()).with_timeout_ms(45_000)];
    let (_, job) =
        seed_job(&registry, &jobs, "acme", JobType::Update, plan, JobStatus::Approved, false).await;

    let finished =
        run_job(&jobs, &registry, &client, &RecordingAudit::default(), &NoopReporter, job.id, "alice")
            .await
            .expect("run");
    assert_eq!(client.sent()[0].timeout_ms, Some(45_000));
    assert_eq!(finished.status, JobStatus::Succeeded);
}

#[tokio::test]
async fn oversized_plan_is_refused() {
    let registry = MemoryRegistry::default();
    let jobs = MemoryJobStore::default();
    let client = ScriptedProvisioner::default();
    let plan = vec![PlanStep::new("noop", "true", Vec::<String>::new()); 33];
    let (_, job) =
        seed_job(&registry, &jobs, "acme", JobType::Update, plan, JobStatus::Approved, false).await;

    let err = run_job(
        &jobs,
        &registry,
        &client,
        &RecordingAudit::default(),
        &NoopReporter,
        job.id,
        "alice",
    )
    .await
    .expect_err("must refuse");
    assert!(matches!(err.downcast_ref::<JobError>(), Some(JobError::PlanTooLong { .. })));
    assert!(client.sent().is_empty());
    assert_eq!(jobs.job(job.id).status, JobStatus::Approved);
}
