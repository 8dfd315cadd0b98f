//! Host key policy backed by an OpenSSH `known_hosts` file

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use directories::BaseDirs;
use russh::keys::PublicKey;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How the server's host key is checked before authenticating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    /// The host must already be in known_hosts with a matching key
    Strict,
    /// Unknown hosts are recorded on first use; a changed key is rejected
    #[default]
    AcceptNew,
    /// Accept any key
    Off,
}

impl FromStr for HostKeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" | "yes" | "true" => Ok(Self::Strict),
            "accept-new" | "tofu" => Ok(Self::AcceptNew),
            "off" | "no" | "false" => Ok(Self::Off),
            other => Err(format!(
                "unknown host key policy '{}' (expected strict, accept-new or off)",
                other
            )),
        }
    }
}

impl fmt::Display for HostKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Strict => "strict",
            Self::AcceptNew => "accept-new",
            Self::Off => "off",
        })
    }
}

/// Returned from the russh handler when a host key is refused
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HostKeyRejected(pub String);

/// Get the default known_hosts file path
pub fn default_known_hosts_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().join(".ssh").join("known_hosts"))
}

/// Applies a [`HostKeyPolicy`] against one known_hosts file
#[derive(Debug, Clone, Default)]
pub struct HostKeyVerifier {
    policy: HostKeyPolicy,
    known_hosts: Option<PathBuf>,
}

impl HostKeyVerifier {
    /// `known_hosts` of `None` means `~/.ssh/known_hosts`
    pub fn new(policy: HostKeyPolicy, known_hosts: Option<PathBuf>) -> Self {
        Self {
            policy,
            known_hosts,
        }
    }

    pub fn policy(&self) -> HostKeyPolicy {
        self.policy
    }

    fn path(&self) -> Option<PathBuf> {
        self.known_hosts.clone().or_else(default_known_hosts_path)
    }

    /// Decide whether to trust `key` for `host:port`
    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> anyhow::Result<bool> {
        if self.policy == HostKeyPolicy::Off {
            warn!("Host key checking disabled, accepting key for {}:{}", host, port);
            return Ok(true);
        }

        let path = self.path().ok_or_else(|| {
            HostKeyRejected("could not determine known_hosts location".to_string())
        })?;

        match russh::keys::check_known_hosts_path(host, port, key, &path) {
            Ok(true) => {
                debug!("Host key for {}:{} matches {:?}", host, port, path);
                Ok(true)
            }
            Ok(false) if self.policy == HostKeyPolicy::AcceptNew => {
                russh::keys::known_hosts::learn_known_hosts_path(host, port, key, &path)?;
                info!("Added host key for {}:{} to {:?}", host, port, path);
                Ok(true)
            }
            Ok(false) => Err(HostKeyRejected(format!(
                "{}:{} is not in {} (strict checking; connect once with \
                 --host-key-checking accept-new or add the key with ssh-keyscan)",
                host,
                port,
                path.display()
            ))
            .into()),
            Err(russh::keys::Error::KeyChanged { line }) => Err(HostKeyRejected(format!(
                "host key for {}:{} does not match {} line {}",
                host,
                port,
                path.display(),
                line
            ))
            .into()),
            Err(e) => Err(e.into()),
        }
    }
}
