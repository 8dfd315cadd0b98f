//! Configuration and CLI argument parsing for vm-deploy
//!
//! Deployment parameters live in a plain `KEY=VALUE` file (`vm-config.env`).
//! The CLI only chooses which file to read and how strictly to treat the
//! server's host key.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use secrecy::{ExposeSecret, SecretString};

use crate::credentials::{ConfigCredentials, CredentialProvider};
use crate::error::{DeployError, Result};
use crate::ssh::HostKeyPolicy;

/// Name of the configuration file looked up when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "vm-config.env";

/// TCP connect + handshake timeout in seconds
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Bound on interactive reads (authentication, channel open) in seconds
pub const READ_TIMEOUT_SECS: u64 = 30;

/// Writing the script to the remote temp file should return immediately
pub const UPLOAD_TIMEOUT_SECS: u64 = 5;

/// Package installation and service startup
pub const PROVISION_TIMEOUT_SECS: u64 = 300;

/// Listing the application's containers
pub const VERIFY_TIMEOUT_SECS: u64 = 10;

/// Default SSH port when `VM_SSH_PORT` is absent
pub const DEFAULT_SSH_PORT: u16 = 22;

pub const KEY_HOST: &str = "VM_PUBLIC_IP";
pub const KEY_USERNAME: &str = "VM_USERNAME";
pub const KEY_PASSWORD: &str = "VM_PASSWORD";
pub const KEY_SSH_PORT: &str = "VM_SSH_PORT";
pub const KEY_APP_PORT: &str = "APP_PORT";
pub const KEY_ADMIN_EMAIL: &str = "ADMIN_EMAIL";
pub const KEY_ADMIN_PASSWORD: &str = "ADMIN_PASSWORD";

/// vm-deploy CLI Arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "vm-deploy")]
#[command(version)]
#[command(about = "Provision the application on a remote VM over SSH")]
pub struct Args {
    /// Path to the KEY=VALUE deployment config
    /// (default: ./vm-config.env, then vm-config.env next to the executable)
    #[arg(long, env = "VM_DEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Host key checking: strict, accept-new or off
    #[arg(
        long = "host-key-checking",
        default_value = "accept-new",
        env = "VM_DEPLOY_HOST_KEY_CHECKING"
    )]
    pub host_key_checking: HostKeyPolicy,

    /// known_hosts file to check and learn keys in (default: ~/.ssh/known_hosts)
    #[arg(long, env = "VM_DEPLOY_KNOWN_HOSTS")]
    pub known_hosts: Option<PathBuf>,

    /// Enable debug logging, on top of any `RUST_LOG` directives
    #[arg(short, long, default_value = "false")]
    pub verbose: bool,
}

/// Resolve the config file location
///
/// An explicit path always wins. Otherwise `vm-config.env` in the current
/// directory is used if present, falling back to the executable's directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return local;
    }

    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_CONFIG_FILE)))
        .unwrap_or(local)
}

/// Parsed `KEY=VALUE` mapping, immutable once loaded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentConfig {
    entries: BTreeMap<String, String>,
}

impl DeploymentConfig {
    /// Parse env-style text
    ///
    /// - blank lines and lines starting with `#` are skipped
    /// - lines without `=` are skipped
    /// - the value is everything after the first `=`, trimmed
    /// - a repeated key keeps its last value
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .collect();

        Self { entries }
    }

    /// Look up a key; empty values count as absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Load a deployment config file
///
/// A missing file is `ConfigNotFound`; no partial mapping is ever returned.
pub fn load_config(path: &Path) -> Result<DeploymentConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DeployError::ConfigNotFound {
            path: path.to_path_buf(),
        },
        _ => DeployError::Io(e),
    })?;

    Ok(DeploymentConfig::parse(&text))
}

/// Validated, typed view over a [`DeploymentConfig`]
#[derive(Debug)]
pub struct Settings {
    pub host: String,
    pub ssh_port: u16,
    pub username: String,
    pub ssh_password: SecretString,
    pub app_port: u16,
    pub admin_email: String,
    pub admin_password: SecretString,
}

impl Settings {
    /// Validate using the plaintext credentials stored in the config itself
    pub fn from_config(config: &DeploymentConfig) -> Result<Self> {
        Self::resolve(config, &ConfigCredentials::new(config))
    }

    /// Validate every required key at once, taking secrets from `credentials`
    ///
    /// All problems are collected into a single `ConfigInvalid`.
    pub fn resolve(
        config: &DeploymentConfig,
        credentials: &dyn CredentialProvider,
    ) -> Result<Self> {
        let mut errors = Vec::new();

        let mut required = |key: &str| match config.get(key) {
            Some(v) => v.to_string(),
            None => {
                errors.push(format!("Missing required {}", key));
                String::new()
            }
        };

        let host = required(KEY_HOST);
        let username = required(KEY_USERNAME);
        let app_port_raw = required(KEY_APP_PORT);
        let admin_email = required(KEY_ADMIN_EMAIL);

        let ssh_password = credentials.ssh_password();
        if ssh_password.is_none() {
            errors.push(format!("Missing required {}", KEY_PASSWORD));
        }

        let admin_password = credentials.admin_password();
        if admin_password.is_none() {
            errors.push(format!("Missing required {}", KEY_ADMIN_PASSWORD));
        }

        let app_port = if app_port_raw.is_empty() {
            0
        } else {
            parse_port(KEY_APP_PORT, &app_port_raw, &mut errors)
        };

        let ssh_port = match config.get(KEY_SSH_PORT) {
            Some(raw) => parse_port(KEY_SSH_PORT, raw, &mut errors),
            None => DEFAULT_SSH_PORT,
        };

        match (ssh_password, admin_password) {
            (Some(ssh_password), Some(admin_password)) if errors.is_empty() => Ok(Settings {
                host,
                ssh_port,
                username,
                ssh_password,
                app_port,
                admin_email,
                admin_password,
            }),
            _ => Err(DeployError::ConfigInvalid(errors)),
        }
    }

    /// `user@host` for progress output
    pub fn target(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }

    /// URL the deployed application is served on
    pub fn access_url(&self) -> String {
        format!("http://{}:{}", self.host, self.app_port)
    }

    pub fn admin_password(&self) -> &str {
        self.admin_password.expose_secret()
    }
}

fn parse_port(key: &str, raw: &str, errors: &mut Vec<String>) -> u16 {
    match raw.parse::<u16>() {
        Ok(port) if port > 0 => port,
        _ => {
            errors.push(format!("{} must be a port number (1-65535), got '{}'", key, raw));
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
# Azure VM
VM_PUBLIC_IP=10.0.0.5
VM_USERNAME=ops

VM_PASSWORD=secret
APP_PORT=8080
# admin account
ADMIN_EMAIL=a@b.com
ADMIN_PASSWORD=pw
";

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let config = DeploymentConfig::parse(SAMPLE);
        assert_eq!(config.len(), 6);
        assert_eq!(config.get("VM_PUBLIC_IP"), Some("10.0.0.5"));
        assert_eq!(config.get("ADMIN_PASSWORD"), Some("pw"));
        assert!(config.iter().all(|(k, _)| !k.starts_with('#')));
    }

    #[test]
    fn test_parse_value_keeps_everything_after_first_equals() {
        let config = DeploymentConfig::parse("TOKEN=a=b==c\n");
        assert_eq!(config.get("TOKEN"), Some("a=b==c"));
    }

    #[test]
    fn test_parse_trims_and_ignores_lines_without_equals() {
        let config =
            DeploymentConfig::parse("  KEY = value  \njust some text\n\t# indented comment\n");
        assert_eq!(config.len(), 1);
        assert_eq!(config.get("KEY"), Some("value"));
    }

    #[test]
    fn test_parse_last_duplicate_wins() {
        let config = DeploymentConfig::parse("APP_PORT=80\nAPP_PORT=8080\n");
        assert_eq!(config.get("APP_PORT"), Some("8080"));
    }

    #[test]
    fn test_empty_value_is_absent() {
        let config = DeploymentConfig::parse("VM_PASSWORD=\n");
        assert_eq!(config.len(), 1);
        assert_eq!(config.get("VM_PASSWORD"), None);
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vm-config.env");
        match load_config(&path) {
            Err(DeployError::ConfigNotFound { path: p }) => assert_eq!(p, path),
            other => panic!("expected ConfigNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_load_config_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config, DeploymentConfig::parse(SAMPLE));
    }

    #[test]
    fn test_settings_from_complete_config() {
        let settings = Settings::from_config(&DeploymentConfig::parse(SAMPLE)).unwrap();
        assert_eq!(settings.host, "10.0.0.5");
        assert_eq!(settings.ssh_port, DEFAULT_SSH_PORT);
        assert_eq!(settings.username, "ops");
        assert_eq!(settings.ssh_password.expose_secret(), "secret");
        assert_eq!(settings.app_port, 8080);
        assert_eq!(settings.access_url(), "http://10.0.0.5:8080");
        assert_eq!(settings.target(), "ops@10.0.0.5");
    }

    #[test]
    fn test_settings_custom_ssh_port() {
        let text = format!("{}VM_SSH_PORT=2222\n", SAMPLE);
        let settings = Settings::from_config(&DeploymentConfig::parse(&text)).unwrap();
        assert_eq!(settings.ssh_port, 2222);
    }

    #[test]
    fn test_settings_missing_password() {
        let text = SAMPLE.replace("VM_PASSWORD=secret\n", "");
        match Settings::from_config(&DeploymentConfig::parse(&text)) {
            Err(DeployError::ConfigInvalid(errors)) => {
                assert_eq!(errors, vec!["Missing required VM_PASSWORD".to_string()]);
            }
            other => panic!("expected ConfigInvalid, got {:?}", other),
        }
    }

    #[test]
    fn test_settings_aggregates_problems() {
        let config = DeploymentConfig::parse("VM_PUBLIC_IP=10.0.0.5\nVM_SSH_PORT=ssh\n");
        match Settings::from_config(&config) {
            Err(DeployError::ConfigInvalid(errors)) => {
                assert_eq!(errors.len(), 6);
                assert!(errors.iter().any(|e| e.contains("VM_USERNAME")));
                assert!(errors.iter().any(|e| e.contains("ADMIN_PASSWORD")));
                assert!(errors.iter().any(|e| e.contains("VM_SSH_PORT must be a port")));
            }
            other => panic!("expected ConfigInvalid, got {:?}", other),
        }
    }

    #[test]
    fn test_settings_rejects_bad_app_port() {
        let text = SAMPLE.replace("APP_PORT=8080", "APP_PORT=70000");
        let err = Settings::from_config(&DeploymentConfig::parse(&text)).unwrap_err();
        assert!(err.to_string().contains("APP_PORT must be a port"));
    }

    #[test]
    fn test_settings_debug_hides_secrets() {
        let settings = Settings::from_config(&DeploymentConfig::parse(SAMPLE)).unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("secret\""));
        assert!(!debug.contains("\"pw\""));
    }

    #[test]
    fn test_resolve_explicit_config_path() {
        let path = resolve_config_path(Some(Path::new("/etc/custom.env")));
        assert_eq!(path, PathBuf::from("/etc/custom.env"));
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["vm-deploy"]);
        assert_eq!(args.host_key_checking, HostKeyPolicy::AcceptNew);
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_host_key_checking() {
        let args = Args::parse_from(["vm-deploy", "--host-key-checking", "strict"]);
        assert_eq!(args.host_key_checking, HostKeyPolicy::Strict);
    }
}
