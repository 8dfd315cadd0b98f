//! vm-deploy - one-shot provisioning of a remote VM over SSH
//!
//! Reads connection parameters from a `KEY=VALUE` file, opens a
//! password-authenticated SSH session, uploads an embedded provisioning
//! script, runs it, verifies the application's containers and prints the
//! access details.
//!
//! # Run sequence
//!
//! 1. [`load_config`] + [`Settings::resolve`] - every required key is
//!    validated before any network activity
//! 2. [`Deployer::connect`] - bounded connect and authentication
//! 3. [`run_provisioning`] - upload, run and verify, each with its own
//!    read deadline and exit-status check
//! 4. [`report::success_banner`] - access URL and admin credentials
//!
//! The session is disconnected exactly once on every path after it opens.
//!
//! # Example Usage (CLI)
//!
//! ```bash
//! vm-deploy --config ./vm-config.env --host-key-checking accept-new
//! ```

pub mod config;
pub mod credentials;
pub mod deployer;
pub mod error;
pub mod report;
pub mod script;
pub mod ssh;

// Re-exports for convenience
pub use config::{load_config, resolve_config_path, Args, DeploymentConfig, Settings};
pub use credentials::{ConfigCredentials, CredentialProvider, EnvCredentials};
pub use deployer::{
    disconnect, run_provisioning, run_step, Connector, Deployer, RemoteOutput, RemoteShell,
    SshConnector, Step,
};
pub use error::{DeployError, Result};
pub use report::{ConsoleReporter, NoopReporter, Reporter};
pub use script::PROVISIONING_SCRIPT;
pub use ssh::{CommandOutput, HostKeyPolicy, HostKeyVerifier, SshConfig, SshSession};
