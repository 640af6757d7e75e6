//! Admin CLI against an in-process provisioner daemon on a temp socket.
//!
//! Jobs are queued as dry runs so the daemon validates every plan step
//! without touching the host.

#![allow(clippy::expect_used)]

use std::path::PathBuf;

use mc_cli::application::services::job_runner::run_job;
use mc_cli::application::services::job_transitions::approve;
use mc_cli::application::services::tenant_provisioning::{CreateTenant, create_tenant};
use mc_cli::infra::{FileStore, JsonlAuditLog, SocketProvisionerClient, StagingDirEnvStager};
use mc_cli::output::{OutputContext, TerminalReporter};
use mc_common::job::JobStatus;
use mc_common::tenant::TenantStatus;
use mc_provisioner::{
    AllowList, Executor, ProvisionerServer, RequestHandler, TokioCommandRunner, socket,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const TOKEN: &str = "e2e-token";

struct Daemon {
    _dir: tempfile::TempDir,
    socket: PathBuf,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Daemon {
    fn start() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let socket = dir.path().join("provisioner.sock");
        let listener = socket::bind(&socket, None).expect("bind");
        let handler = RequestHandler::new(
            TOKEN,
            AllowList::default(),
            Executor::new(TokioCommandRunner::new()),
        );
        let (stop, stopped) = oneshot::channel::<()>();
        let server = ProvisionerServer::new(listener, socket.clone(), handler, 4);
        let task = tokio::spawn(server.serve(async {
            let _ = stopped.await;
        }));
        Self {
            _dir: dir,
            socket,
            stop,
            task,
        }
    }

    async fn shutdown(self) {
        let _ = self.stop.send(());
        self.task.await.expect("server task");
    }
}

/// Queues an approved dry-run bootstrap job for `acme` and returns its id.
async fn approved_dry_run(store: &FileStore, audit: &JsonlAuditLog, data_dir: &std::path::Path) -> u64 {
    let output = OutputContext::new(true, true);
    let stager = StagingDirEnvStager::new(data_dir.join("tenant-env"));
    let queued = create_tenant(
        store,
        store,
        &stager,
        audit,
        &TerminalReporter::new(&output),
        CreateTenant {
            slug: "acme".into(),
            display_name: None,
            env: Vec::new(),
            dry_run: true,
            actor: "alice".into(),
        },
    )
    .await
    .expect("create");
    approve(store, audit, queued.job.id, "bob").await.expect("approve");
    queued.job.id
}

#[tokio::test]
async fn dry_run_job_passes_daemon_validation() {
    let daemon = Daemon::start();
    let data = tempfile::tempdir().expect("tempdir");
    let store = FileStore::in_dir(data.path());
    let audit = JsonlAuditLog::in_dir(data.path());
    let id = approved_dry_run(&store, &audit, data.path()).await;

    let output = OutputContext::new(true, true);
    let client = SocketProvisionerClient::new(daemon.socket.clone(), TOKEN.into());
    let job = run_job(&store, &store, &client, &audit, &TerminalReporter::new(&output), id, "bob")
        .await
        .expect("run");

    assert_eq!(job.status, JobStatus::Succeeded, "error: {:?}", job.error);
    assert_eq!(job.steps.len(), job.plan_json.len());
    assert!(job.steps.iter().all(|s| s.result.ok && s.result.skipped));

    // A dry run never moves the tenant.
    let reloaded = FileStore::in_dir(data.path());
    let tenant = mc_cli::application::services::job_query::get_tenant(
        &reloaded,
        &mc_cli::domain::TenantRef::parse("acme"),
    )
    .await
    .expect("tenant");
    assert_eq!(tenant.status, TenantStatus::Pending);

    daemon.shutdown().await;
}

#[tokio::test]
async fn wrong_token_fails_first_step() {
    let daemon = Daemon::start();
    let data = tempfile::tempdir().expect("tempdir");
    let store = FileStore::in_dir(data.path());
    let audit = JsonlAuditLog::in_dir(data.path());
    let id = approved_dry_run(&store, &audit, data.path()).await;

    let output = OutputContext::new(true, true);
    let client = SocketProvisionerClient::new(daemon.socket.clone(), "not-the-token".into());
    let job = run_job(&store, &store, &client, &audit, &TerminalReporter::new(&output), id, "bob")
        .await
        .expect("run");

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failed_step, Some(1));
    assert_eq!(job.steps.len(), 1);
    assert_eq!(job.steps[0].result.error.as_deref(), Some("Unauthorized"));

    daemon.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn binary_runs_job_through_daemon() {
    let daemon = Daemon::start();
    let data = tempfile::tempdir().expect("tempdir");
    let data_dir = data.path().to_path_buf();
    let socket_path = daemon.socket.clone();

    let output = tokio::task::spawn_blocking(move || {
        let mc_admin = || {
            let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("mc-admin"));
            cmd.env("NO_COLOR", "1")
                .env("MC_DATA_DIR", &data_dir)
                .env("MC_ENV_STAGING_DIR", data_dir.join("tenant-env"))
                .env("MC_ACTOR", "alice")
                .env("MC_PROVISIONER_SOCKET", &socket_path)
                .env("MC_PROVISIONER_TOKEN", TOKEN);
            cmd
        };
        mc_admin().args(["tenant", "create", "acme", "--dry-run"]).assert().success();
        mc_admin().args(["job", "approve", "1"]).assert().success();
        mc_admin()
            .args(["job", "run", "1", "--json"])
            .output()
            .expect("run mc-admin")
    })
    .await
    .expect("blocking task");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let job: serde_json::Value = serde_json::from_slice(&output.stdout).expect("job json");
    assert_eq!(job["status"], "succeeded");
    assert_eq!(job["id"], 1);

    daemon.shutdown().await;
}
