//! Credential sources for the SSH and application admin passwords
//!
//! [`Settings`](crate::config::Settings) never reads secrets directly; it asks
//! a [`CredentialProvider`]. The binary layers the process environment over
//! the plaintext config file.

use secrecy::SecretString;

use crate::config::{DeploymentConfig, KEY_ADMIN_PASSWORD, KEY_PASSWORD};

/// Environment variable overriding `VM_PASSWORD`
pub const ENV_SSH_PASSWORD: &str = "VM_DEPLOY_SSH_PASSWORD";

/// Environment variable overriding `ADMIN_PASSWORD`
pub const ENV_ADMIN_PASSWORD: &str = "VM_DEPLOY_ADMIN_PASSWORD";

/// Source of deployment secrets
pub trait CredentialProvider {
    /// Password for SSH password authentication
    fn ssh_password(&self) -> Option<SecretString>;

    /// Password of the application's administrator account
    fn admin_password(&self) -> Option<SecretString>;
}

/// Reads secrets from the deployment config file itself
#[derive(Debug, Clone, Copy)]
pub struct ConfigCredentials<'a> {
    config: &'a DeploymentConfig,
}

impl<'a> ConfigCredentials<'a> {
    pub fn new(config: &'a DeploymentConfig) -> Self {
        Self { config }
    }

    fn secret(&self, key: &str) -> Option<SecretString> {
        self.config
            .get(key)
            .map(|v| SecretString::new(v.to_string()))
    }
}

impl CredentialProvider for ConfigCredentials<'_> {
    fn ssh_password(&self) -> Option<SecretString> {
        self.secret(KEY_PASSWORD)
    }

    fn admin_password(&self) -> Option<SecretString> {
        self.secret(KEY_ADMIN_PASSWORD)
    }
}

/// Reads secrets from environment variables, deferring to `fallback`
/// for any variable that is unset or empty.
#[derive(Debug, Clone)]
pub struct EnvCredentials<P> {
    ssh_var: String,
    admin_var: String,
    fallback: P,
}

impl<P: CredentialProvider> EnvCredentials<P> {
    /// Use [`ENV_SSH_PASSWORD`] and [`ENV_ADMIN_PASSWORD`]
    pub fn new(fallback: P) -> Self {
        Self::with_vars(ENV_SSH_PASSWORD, ENV_ADMIN_PASSWORD, fallback)
    }

    pub fn with_vars(
        ssh_var: impl Into<String>,
        admin_var: impl Into<String>,
        fallback: P,
    ) -> Self {
        Self {
            ssh_var: ssh_var.into(),
            admin_var: admin_var.into(),
            fallback,
        }
    }
}

fn from_env(var: &str) -> Option<SecretString> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .map(SecretString::new)
}

impl<P: CredentialProvider> CredentialProvider for EnvCredentials<P> {
    fn ssh_password(&self) -> Option<SecretString> {
        from_env(&self.ssh_var).or_else(|| self.fallback.ssh_password())
    }

    fn admin_password(&self) -> Option<SecretString> {
        from_env(&self.admin_var).or_else(|| self.fallback.admin_password())
    }
}
