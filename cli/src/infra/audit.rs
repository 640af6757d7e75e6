//! Infrastructure implementation of the `AuditSink` port.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::{AuditRecord, AuditSink};

pub const AUDIT_FILE: &str = "audit.jsonl";

/// Appends one JSON object per line to `audit.jsonl` and mirrors every
/// record to the `audit` tracing target.
pub struct JsonlAuditLog {
    path: PathBuf,
}

impl JsonlAuditLog {
    #[must_use]
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(AUDIT_FILE),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditLog {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        tracing::info!(
            target: "audit",
            actor = %record.actor,
            action = %record.action,
            job_id = ?record.job_id,
            tenant_id = ?record.tenant_id,
            from = ?record.from,
            to = ?record.to,
            "audit"
        );

        let mut line = serde_json::to_string(record).context("serializing audit record")?;
        line.push('\n');
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating directory {}", parent.display()))?;
            }
            let mut options = std::fs::OpenOptions::new();
            options.create(true).append(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut file = options
                .open(&path)
                .with_context(|| format!("opening audit log {}", path.display()))?;
            file.write_all(line.as_bytes())
                .with_context(|| format!("appending to audit log {}", path.display()))
        })
        .await
        .context("audit write task panicked")?
    }
}
