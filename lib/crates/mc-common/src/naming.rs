//! Naming rules and host paths shared by the planner and the validator.
//!
//! Both sides must agree byte-for-byte: the planner builds arguments from
//! these helpers and the daemon only accepts arguments of exactly this shape.

use std::sync::LazyLock;

use regex::Regex;

/// Linux usernames the daemon is allowed to create or touch.
pub static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Safety: this is a compile-time constant pattern, cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-z_][a-z0-9_-]{1,30}$").expect("valid regex")
});

/// Tenant slugs. Short enough that `oc-<slug>` still satisfies [`USERNAME_RE`].
pub static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-z][a-z0-9-]{0,26}[a-z0-9]$").expect("valid regex")
});

/// Prefix prepended to a tenant slug to form its Linux user.
pub const LINUX_USER_PREFIX: &str = "oc-";

/// Root-owned directory holding one env file per tenant.
pub const TENANTS_DIR: &str = "/etc/openclaw-tenants";

/// Directory where the unprivileged web tier stages tenant env files.
pub const TENANT_ENV_STAGING_DIR: &str = "/var/lib/mission-control/tenant-env";

/// Gateway config copied into a fresh tenant home.
pub const CONFIG_TEMPLATE: &str = "/opt/openclaw/templates/openclaw.json";

/// Templated systemd unit shared by every tenant gateway.
pub const UNIT_TEMPLATE: &str = "/opt/openclaw/templates/openclaw-gateway@.service";

/// Installed location of [`UNIT_TEMPLATE`].
pub const UNIT_TARGET: &str = "/etc/systemd/system/openclaw-gateway@.service";

/// Prefix of every per-tenant home directory.
pub const HOME_PREFIX: &str = "/home/";

#[must_use]
pub fn is_valid_username(name: &str) -> bool {
    USERNAME_RE.is_match(name)
}

#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}

/// Derive the Linux user for a tenant slug. Callers validate the slug first.
#[must_use]
pub fn linux_user_for_slug(slug: &str) -> String {
    format!("{LINUX_USER_PREFIX}{slug}")
}

#[must_use]
pub fn home_dir(user: &str) -> String {
    format!("{HOME_PREFIX}{user}")
}

#[must_use]
pub fn openclaw_dir(user: &str) -> String {
    format!("{HOME_PREFIX}{user}/.openclaw")
}

#[must_use]
pub fn workspace_dir(user: &str) -> String {
    format!("{HOME_PREFIX}{user}/workspace")
}

#[must_use]
pub fn tenant_config_path(user: &str) -> String {
    format!("{HOME_PREFIX}{user}/.openclaw/openclaw.json")
}

#[must_use]
pub fn tenant_env_path(user: &str) -> String {
    format!("{TENANTS_DIR}/{user}.env")
}

#[must_use]
pub fn staged_env_path(user: &str) -> String {
    format!("{TENANT_ENV_STAGING_DIR}/{user}.env")
}

#[must_use]
pub fn gateway_service(user: &str) -> String {
    format!("openclaw-gateway@{user}.service")
}
