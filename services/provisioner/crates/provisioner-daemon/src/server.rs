//! Accept loop and per-connection protocol handling.
//!
//! Each connection carries exactly one request line and receives exactly one
//! response line; the daemon then closes its side.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mc_common::protocol::CommandResult;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::handler::RequestHandler;
use crate::runner::CommandRunner;
use crate::socket;
use crate::validator::CommandValidator;

/// Longest request line accepted, newline included.
pub const MAX_REQUEST_BYTES: u64 = 64 * 1024;

/// How long a client may take to send its request line.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct ProvisionerServer<V, R> {
    listener: UnixListener,
    socket_path: PathBuf,
    handler: Arc<RequestHandler<V, R>>,
    connections: Arc<Semaphore>,
}

impl<V, R> ProvisionerServer<V, R>
where
    V: CommandValidator + 'static,
    R: CommandRunner + 'static,
{
    #[must_use]
    pub fn new(
        listener: UnixListener,
        socket_path: PathBuf,
        handler: RequestHandler<V, R>,
        max_connections: usize,
    ) -> Self {
        Self {
            listener,
            socket_path,
            handler: Arc::new(handler),
            connections: Arc::new(Semaphore::new(max_connections.max(1))),
        }
    }

    /// Serve until `shutdown` resolves, then remove the socket file.
    ///
    /// Connections already accepted keep running in their own tasks.
    pub async fn serve<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(path = %self.socket_path.display(), "provisioner listening");

        loop {
            let permit = tokio::select! {
                () = &mut shutdown => break,
                permit = Arc::clone(&self.connections).acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            let stream = tokio::select! {
                () = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        error!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
            };

            if let Ok(cred) = stream.peer_cred() {
                debug!(uid = cred.uid(), gid = cred.gid(), pid = ?cred.pid(), "connection accepted");
            }

            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, &handler).await {
                    debug!(error = %e, "connection ended with error");
                }
                drop(permit);
            });
        }

        socket::remove_socket(&self.socket_path);
        info!("provisioner stopped");
    }
}

/// Read one request line, answer it, close.
///
/// Oversized or slow requests are answered with an error result rather than
/// dropped silently, so clients always get exactly one line back.
pub async fn handle_connection<V, R>(
    stream: UnixStream,
    handler: &RequestHandler<V, R>,
) -> std::io::Result<()>
where
    V: CommandValidator,
    R: CommandRunner,
{
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half).take(MAX_REQUEST_BYTES);
    let mut line = String::new();

    let result = match tokio::time::timeout(READ_TIMEOUT, reader.read_line(&mut line)).await {
        Err(_) => {
            warn!("client did not send a request in time");
            CommandResult::invalid_request("timed out waiting for request")
        }
        Ok(Err(e)) => {
            debug!(error = %e, "request read failed");
            CommandResult::invalid_json()
        }
        Ok(Ok(n)) if u64::try_from(n).unwrap_or(u64::MAX) >= MAX_REQUEST_BYTES && !line.ends_with('\n') => {
            warn!(limit = MAX_REQUEST_BYTES, "request too large");
            CommandResult::invalid_request("request too large")
        }
        Ok(Ok(_)) => handler.handle_line(line.trim_end_matches(['\r', '\n'])).await,
    };

    let mut payload = serde_json::to_vec(&result).map_err(std::io::Error::other)?;
    payload.push(b'\n');
    write_half.write_all(&payload).await?;
    write_half.shutdown().await
}
