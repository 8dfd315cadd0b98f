//! SSH client handler implementation
//!
//! Implements the `russh::client::Handler` trait to handle SSH connection events.

use super::known_hosts::HostKeyVerifier;

/// SSH client handler for russh
///
/// Server key verification is delegated to a [`HostKeyVerifier`] for the
/// host and port being dialed.
#[derive(Debug, Clone)]
pub struct SshHandler {
    host: String,
    port: u16,
    verifier: HostKeyVerifier,
}

impl SshHandler {
    /// Create a new SSH handler
    pub fn new(host: impl Into<String>, port: u16, verifier: HostKeyVerifier) -> Self {
        Self {
            host: host.into(),
            port,
            verifier,
        }
    }
}

impl russh::client::Handler for SshHandler {
    type Error = anyhow::Error;

    /// Verify the server's host key
    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        self.verifier
            .verify(&self.host, self.port, server_public_key)
    }
}
