//! Infrastructure layer: concrete implementations of application port traits.
//!
//! All I/O lives here: the daemon socket, the JSON store, the audit log and
//! env staging.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

mod atomic;
pub mod audit;
pub mod config;
pub mod env_stager;
pub mod provisioner_client;
pub mod store;

pub use audit::JsonlAuditLog;
pub use config::{ProvisionerConfig, StagingConfig, default_data_dir};
pub use env_stager::StagingDirEnvStager;
pub use provisioner_client::SocketProvisionerClient;
pub use store::FileStore;
