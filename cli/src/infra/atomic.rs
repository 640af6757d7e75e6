//! Atomic file replacement with permissions fixed from creation.

use std::fs::File;
use std::io::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

/// Create `path` fresh with `mode`, so the contents are never readable by
/// anyone the final file would not admit. A leftover file at `path` is
/// removed first; its permissions are not trusted.
pub(crate) fn create_restricted(path: &Path, mode: u32) -> Result<File> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("removing stale {}", path.display()));
        }
    }
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    let file = options
        .open(path)
        .with_context(|| format!("creating {}", path.display()))?;
    // umask may have narrowed the mode further; pin the exact value.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(mode))
            .with_context(|| format!("setting permissions on {}", path.display()))?;
    }
    Ok(file)
}

/// Write `contents` to `temp`, then rename it over `target`.
pub(crate) fn replace(target: &Path, temp: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let mut file = create_restricted(temp, mode)?;
    file.write_all(contents)
        .with_context(|| format!("writing temp file {}", temp.display()))?;
    file.sync_all()
        .with_context(|| format!("flushing temp file {}", temp.display()))?;
    drop(file);
    std::fs::rename(temp, target).with_context(|| format!("finalizing {}", target.display()))
}
