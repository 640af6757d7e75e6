//! mc-provisioner entry point.
//!
//! Initialises tracing, loads configuration from `MC_PROVISIONER_*`
//! environment variables, binds the socket and serves until SIGINT or
//! SIGTERM.

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tracing_subscriber::EnvFilter;

use mc_provisioner::{
    AllowList, DaemonConfig, Executor, ProvisionerServer, RequestHandler, TokioCommandRunner,
    socket,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("mc-provisioner starting");

    let config = DaemonConfig::from_env()?;
    tracing::info!(
        socket = %config.socket.display(),
        group = %config.group,
        max_connections = config.max_connections,
        "configuration loaded",
    );

    let listener = socket::bind(&config.socket, Some(&config.group))
        .context("failed to set up provisioner socket")?;

    let handler = RequestHandler::new(
        &config.token,
        AllowList::default(),
        Executor::new(TokioCommandRunner::new()),
    );
    let shutdown = shutdown_signal()?;

    ProvisionerServer::new(listener, config.socket.clone(), handler, config.max_connections)
        .serve(shutdown)
        .await;

    tracing::info!("mc-provisioner shut down");
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut interrupt = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let mut terminate = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
        tracing::info!("received shutdown signal");
    })
}
