//! Error types for vm-deploy

use std::path::PathBuf;

use thiserror::Error;

use crate::deployer::Step;

/// Main error type for a deployment run
///
/// Every variant is terminal for the run; nothing is retried.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The configuration file does not exist
    #[error("{} not found", .path.display())]
    ConfigNotFound { path: PathBuf },

    /// One or more required keys are missing, empty or malformed
    #[error("Invalid configuration:\n{}", .0.join("\n"))]
    ConfigInvalid(Vec<String>),

    /// TCP connect, handshake or timeout while establishing the session
    #[error("SSH connection error: {0}")]
    ConnectionFailed(String),

    /// Password authentication was rejected or could not complete
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The server's host key was rejected by the host-key policy
    #[error("Host key verification failed: {0}")]
    HostKey(String),

    /// A remote command exceeded its read deadline
    #[error("Command timeout after {0}ms")]
    Timeout(u64),

    /// Opening a channel, sending or reading a remote command failed
    #[error("Remote command error: {0}")]
    RemoteCommand(String),

    /// A provisioning step finished with a non-zero (or missing) exit status
    #[error("Step '{step}' failed ({})", describe_exit(.exit_code))]
    RemoteStepFailed {
        step: Step,
        exit_code: Option<u32>,
        output: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using DeployError
pub type Result<T> = std::result::Result<T, DeployError>;

fn describe_exit(exit_code: &Option<u32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {}", code),
        None => "no exit status reported".to_string(),
    }
}

impl DeployError {
    /// Create a connection error from a string
    pub fn connection(msg: impl Into<String>) -> Self {
        DeployError::ConnectionFailed(msg.into())
    }

    /// Create an authentication error from a string
    pub fn auth(msg: impl Into<String>) -> Self {
        DeployError::Authentication(msg.into())
    }

    /// Create a remote command error from a string
    pub fn remote(msg: impl Into<String>) -> Self {
        DeployError::RemoteCommand(msg.into())
    }

    /// True for failures that happened before a session was usable.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            DeployError::ConnectionFailed(_)
                | DeployError::Authentication(_)
                | DeployError::HostKey(_)
        )
    }

    /// Process exit status for this error
    ///
    /// - 2: configuration missing or invalid
    /// - 3: connection, authentication or host key failure
    /// - 4: remote command failure
    /// - 1: anything else
    pub fn exit_code(&self) -> u8 {
        match self {
            DeployError::ConfigNotFound { .. } | DeployError::ConfigInvalid(_) => 2,
            DeployError::ConnectionFailed(_)
            | DeployError::Authentication(_)
            | DeployError::HostKey(_) => 3,
            DeployError::Timeout(_)
            | DeployError::RemoteCommand(_)
            | DeployError::RemoteStepFailed { .. } => 4,
            DeployError::Io(_) => 1,
        }
    }
}
