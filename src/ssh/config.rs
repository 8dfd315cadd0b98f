//! SSH configuration types
//!
//! Connection parameters for one password-authenticated session.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use super::known_hosts::HostKeyVerifier;
use crate::config::{Settings, CONNECT_TIMEOUT_SECS, DEFAULT_SSH_PORT, READ_TIMEOUT_SECS};

/// SSH connection configuration
#[derive(Debug)]
pub struct SshConfig {
    /// Remote hostname or IP address
    pub host: String,

    /// SSH port (default: 22)
    pub port: u16,

    /// Username for authentication
    pub username: String,

    /// Password for password authentication
    pub password: SecretString,

    /// Bound on TCP connect + key exchange
    pub connect_timeout: Duration,

    /// Bound on authentication and channel open
    pub read_timeout: Duration,

    /// Host key policy applied during the handshake
    pub host_keys: HostKeyVerifier,
}

impl SshConfig {
    /// Create a new SSH configuration with minimal required fields
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            username: username.into(),
            password,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            host_keys: HostKeyVerifier::default(),
        }
    }

    /// Build from validated deployment settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.host,
            &settings.username,
            SecretString::new(settings.ssh_password.expose_secret().clone()),
        )
        .with_port(settings.ssh_port)
    }

    /// Set the SSH port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the host key policy
    pub fn with_host_keys(mut self, host_keys: HostKeyVerifier) -> Self {
        self.host_keys = host_keys;
        self
    }

    /// Set the connection-establishment timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `host:port` socket address string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
