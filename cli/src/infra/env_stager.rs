//! Infrastructure implementation of the `TenantEnvStager` port.
//!
//! The daemon never accepts file contents; it only copies
//! `<staging>/<user>.env` into the tenants directory with `cp -f`. This
//! stager writes that source file.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use mc_common::naming::is_valid_username;

use crate::application::ports::TenantEnvStager;
use crate::infra::atomic;

/// Env files hold tenant secrets: owner read/write, group read.
const ENV_FILE_MODE: u32 = 0o640;

pub struct StagingDirEnvStager {
    dir: PathBuf,
}

impl StagingDirEnvStager {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl TenantEnvStager for StagingDirEnvStager {
    async fn stage(&self, linux_user: &str, contents: &str) -> Result<PathBuf> {
        if !is_valid_username(linux_user) {
            bail!("refusing to stage env for invalid user '{linux_user}'");
        }
        let path = self.dir.join(format!("{linux_user}.env"));
        let contents = contents.to_string();
        let dir = self.dir.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating staging directory {}", dir.display()))?;
            let temp_path = target.with_extension("env.tmp");
            atomic::replace(&target, &temp_path, contents.as_bytes(), ENV_FILE_MODE)
        })
        .await
        .context("staging task panicked")??;

        tracing::info!(user = linux_user, path = %path.display(), "tenant env staged");
        Ok(path)
    }
}
