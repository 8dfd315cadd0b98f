//! SSH Session
//!
//! One authenticated russh connection to the deployment target, owned by a
//! single deployment run.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Handle};
use russh::Channel;
use secrecy::ExposeSecret;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::config::SshConfig;
use super::handler::SshHandler;
use super::known_hosts::HostKeyRejected;
use crate::error::{DeployError, Result};

/// Authenticated SSH session
///
/// Created with [`SshSession::connect`], released with [`SshSession::close`].
/// Commands are executed one at a time, each on a fresh exec channel.
pub struct SshSession {
    /// Active SSH session handle, `None` once closed
    handle: Option<Handle<SshHandler>>,

    /// `user@host:port`, for logs
    target: String,

    /// Bound on channel open
    read_timeout: Duration,
}

impl SshSession {
    /// Establish and authenticate an SSH connection
    pub async fn connect(config: &SshConfig) -> Result<Self> {
        let target = format!("{}@{}:{}", config.username, config.host, config.port);
        info!("Connecting to SSH server {}...", config.address());

        let ssh_config = Arc::new(client::Config::default());
        let handler = SshHandler::new(&config.host, config.port, config.host_keys.clone());

        let addr = config.address();
        let connect_result = timeout(
            config.connect_timeout,
            client::connect(ssh_config, addr.as_str(), handler),
        )
        .await;

        let mut handle = match connect_result {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                error!("SSH connection failed: {}", e);
                return Err(match e.downcast_ref::<HostKeyRejected>() {
                    Some(rejected) => DeployError::HostKey(rejected.to_string()),
                    None => DeployError::connection(e.to_string()),
                });
            }
            Err(_) => {
                error!("SSH connection timeout after {:?}", config.connect_timeout);
                return Err(DeployError::connection(format!(
                    "Connection timeout after {:?}",
                    config.connect_timeout
                )));
            }
        };

        if let Err(e) = Self::authenticate(&mut handle, config).await {
            let close = handle.disconnect(russh::Disconnect::ByApplication, "", "English");
            return Err(abandon(close, e).await);
        }

        info!("Successfully connected to {}", target);

        Ok(Self {
            handle: Some(handle),
            target,
            read_timeout: config.read_timeout,
        })
    }

    /// Password authentication, bounded by the read timeout
    async fn authenticate(handle: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
        debug!(
            "Attempting password authentication for user '{}'",
            config.username
        );

        let auth = timeout(
            config.read_timeout,
            handle.authenticate_password(
                config.username.as_str(),
                config.password.expose_secret().as_str(),
            ),
        )
        .await
        .map_err(|_| {
            DeployError::auth(format!(
                "no response within {}s",
                config.read_timeout.as_secs()
            ))
        })?
        .map_err(|e| DeployError::auth(e.to_string()))?;

        if auth.success() {
            info!("Password authentication successful");
            Ok(())
        } else {
            Err(DeployError::auth("Password authentication rejected"))
        }
    }

    /// Open a new session channel
    pub(crate) async fn open_channel(&self) -> Result<Channel<client::Msg>> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| DeployError::remote("SSH session already closed"))?;

        timeout(self.read_timeout, handle.channel_open_session())
            .await
            .map_err(|_| {
                DeployError::remote(format!(
                    "channel open timed out after {}s",
                    self.read_timeout.as_secs()
                ))
            })?
            .map_err(|e| DeployError::remote(format!("Failed to open channel: {}", e)))
    }

    /// Close the SSH connection
    ///
    /// Closing an already closed session is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        handle
            .disconnect(russh::Disconnect::ByApplication, "", "English")
            .await
            .map_err(|e| DeployError::remote(format!("Failed to disconnect: {}", e)))?;

        info!("SSH connection to {} closed", self.target);
        Ok(())
    }
}

/// Run `close` and hand back `err`; a close failure is only logged
async fn abandon<F, E>(close: F, err: DeployError) -> DeployError
where
    F: Future<Output = std::result::Result<(), E>>,
    E: std::fmt::Display,
{
    if let Err(e) = close.await {
        warn!("Failed to close SSH session: {}", e);
    }
    err
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("target", &self.target)
            .field("open", &self.handle.is_some())
            .finish()
    }
}
