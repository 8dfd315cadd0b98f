//! SSH transport for the deployment run
//!
//! Password-authenticated russh sessions with an explicit host-key policy
//! and per-command read deadlines.

pub mod command;
pub mod config;
pub mod handler;
pub mod known_hosts;
pub mod session;

// Re-exports
pub use command::CommandOutput;
pub use config::SshConfig;
pub use handler::SshHandler;
pub use known_hosts::{HostKeyPolicy, HostKeyRejected, HostKeyVerifier};
pub use session::SshSession;
