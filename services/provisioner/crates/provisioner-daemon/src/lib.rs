//! Privileged provisioning daemon for Mission Control.
//!
//! Listens on a Unix socket, authenticates each request with a shared token,
//! checks it against a fixed allow-list and runs the resulting command
//! directly, without a shell.

pub mod config;
pub mod executor;
pub mod handler;
pub mod runner;
pub mod server;
pub mod socket;
pub mod validator;

pub use config::DaemonConfig;
pub use executor::{Executor, RetryPolicy};
pub use handler::RequestHandler;
pub use runner::{CommandRunner, RunOutcome, TokioCommandRunner};
pub use server::ProvisionerServer;
pub use validator::{AllowList, CommandValidator, Invocation, Rejection};
