//! Unix socket lifecycle: stale cleanup, bind, permissions, ownership.

use std::io;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::{Path, PathBuf};

use nix::unistd::Group;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{debug, info, warn};

/// Owner and group may connect; nobody else.
pub const SOCKET_MODE: u32 = 0o660;

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("{path} exists and is not a socket; refusing to remove it")]
    NotASocket { path: PathBuf },

    #[error("failed to remove stale socket {path}: {source}")]
    RemoveStale { path: PathBuf, source: io::Error },

    #[error("failed to bind {path}: {source}")]
    Bind { path: PathBuf, source: io::Error },

    #[error("failed to set permissions on {path}: {source}")]
    Permissions { path: PathBuf, source: io::Error },

    #[error("unknown group '{0}'")]
    UnknownGroup(String),

    #[error("failed to look up group '{name}': {source}")]
    GroupLookup { name: String, source: nix::Error },

    #[error("failed to chown {path}: {source}")]
    Chown { path: PathBuf, source: io::Error },
}

/// Bind the provisioner socket at `path`.
///
/// A leftover socket from a previous run is removed first; any other kind of
/// file at `path` is left alone and reported. The socket is chmodded to
/// [`SOCKET_MODE`] and, when `group` is given, chowned to `root:<group>`.
pub fn bind(path: &Path, group: Option<&str>) -> Result<UnixListener, SocketError> {
    remove_stale(path)?;

    let listener = UnixListener::bind(path).map_err(|source| SocketError::Bind {
        path: path.to_path_buf(),
        source,
    })?;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(SOCKET_MODE)).map_err(
        |source| SocketError::Permissions {
            path: path.to_path_buf(),
            source,
        },
    )?;

    if let Some(name) = group {
        let gid = lookup_gid(name)?;
        std::os::unix::fs::chown(path, Some(0), Some(gid)).map_err(|source| SocketError::Chown {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), group = name, gid, "socket ownership set");
    }

    info!(path = %path.display(), mode = format!("{SOCKET_MODE:o}"), "socket bound");
    Ok(listener)
}

/// Best-effort removal on shutdown.
pub fn remove_socket(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "socket removed"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove socket"),
    }
}

fn remove_stale(path: &Path) -> Result<(), SocketError> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(SocketError::RemoveStale {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if !metadata.file_type().is_socket() {
        return Err(SocketError::NotASocket {
            path: path.to_path_buf(),
        });
    }
    std::fs::remove_file(path).map_err(|source| SocketError::RemoveStale {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "removed stale socket");
    Ok(())
}

fn lookup_gid(name: &str) -> Result<u32, SocketError> {
    Group::from_name(name)
        .map_err(|source| SocketError::GroupLookup {
            name: name.to_string(),
            source,
        })?
        .map(|g| g.gid.as_raw())
        .ok_or_else(|| SocketError::UnknownGroup(name.to_string()))
}
