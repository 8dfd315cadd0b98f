//! Deployment orchestration
//!
//! A run is strictly sequential over one session: upload the script, run
//! it, verify the containers. The first failing step ends the run, and the
//! session is disconnected exactly once on every path after it was opened.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::config::{Settings, PROVISION_TIMEOUT_SECS, UPLOAD_TIMEOUT_SECS, VERIFY_TIMEOUT_SECS};
use crate::error::{DeployError, Result};
use crate::report::Reporter;
use crate::script;
use crate::ssh::{CommandOutput, HostKeyVerifier, SshConfig, SshSession};

/// A remote provisioning step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Write the provisioning script to the remote temp file
    Upload,
    /// Execute the uploaded script
    Provision,
    /// List the application's containers
    Verify,
}

impl Step {
    /// Every step, in execution order
    pub const ALL: [Step; 3] = [Step::Upload, Step::Provision, Step::Verify];

    /// Remote command for this step
    pub fn command(&self) -> String {
        match self {
            Step::Upload => script::upload_command(),
            Step::Provision => script::run_command(),
            Step::Verify => script::verify_command(),
        }
    }

    /// Read deadline for this step
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(match self {
            Step::Upload => UPLOAD_TIMEOUT_SECS,
            Step::Provision => PROVISION_TIMEOUT_SECS,
            Step::Verify => VERIFY_TIMEOUT_SECS,
        })
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Upload => "upload script",
            Step::Provision => "run script",
            Step::Verify => "verify deployment",
        })
    }
}

/// Captured output of a complete provisioning run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub upload: CommandOutput,
    pub provision: CommandOutput,
    pub verify: CommandOutput,
}

/// An open session commands can be issued on
#[async_trait]
pub trait RemoteShell: Send {
    /// Run one command to completion within `timeout`
    async fn exec(&mut self, command: &str, timeout: Duration) -> Result<CommandOutput>;

    /// Release the session
    async fn close(&mut self) -> Result<()>;
}

/// Opens a [`RemoteShell`] to the configured target
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: RemoteShell;

    async fn connect(&self, settings: &Settings) -> Result<Self::Session>;
}

#[async_trait]
impl RemoteShell for SshSession {
    async fn exec(&mut self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        self.exec_command(command, timeout).await
    }

    async fn close(&mut self) -> Result<()> {
        SshSession::close(self).await
    }
}

/// Connects with russh using a fixed host-key policy
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    host_keys: HostKeyVerifier,
}

impl SshConnector {
    pub fn new(host_keys: HostKeyVerifier) -> Self {
        Self { host_keys }
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Session = SshSession;

    async fn connect(&self, settings: &Settings) -> Result<SshSession> {
        let config = SshConfig::from_settings(settings).with_host_keys(self.host_keys.clone());
        SshSession::connect(&config).await
    }
}

/// Orchestrates a one-shot provisioning run
#[derive(Debug)]
pub struct Deployer<C> {
    connector: C,
}

impl<C: Connector> Deployer<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    /// Open the session; no remote command has been sent when this fails
    pub async fn connect(&self, settings: &Settings) -> Result<C::Session> {
        self.connector.connect(settings).await
    }

    /// Connect, provision, and always disconnect
    ///
    /// The returned error is the first failure of the run; a failure while
    /// disconnecting is only logged.
    pub async fn deploy(
        &self,
        settings: &Settings,
        reporter: &mut dyn Reporter,
    ) -> Result<RemoteOutput> {
        let mut session = self.connect(settings).await?;
        reporter.connected(settings);

        let outcome = run_provisioning(&mut session, reporter).await;
        if let Err(ref e) = outcome {
            error!("Deployment failed: {}", e);
        }

        disconnect(&mut session).await;
        outcome
    }
}

/// Issue the three steps in order over `session`
pub async fn run_provisioning<S>(
    session: &mut S,
    reporter: &mut dyn Reporter,
) -> Result<RemoteOutput>
where
    S: RemoteShell + ?Sized,
{
    let upload = run_step(session, Step::Upload, reporter).await?;
    let provision = run_step(session, Step::Provision, reporter).await?;
    let verify = run_step(session, Step::Verify, reporter).await?;

    Ok(RemoteOutput {
        upload,
        provision,
        verify,
    })
}

/// Run one step and check its exit status
pub async fn run_step<S>(
    session: &mut S,
    step: Step,
    reporter: &mut dyn Reporter,
) -> Result<CommandOutput>
where
    S: RemoteShell + ?Sized,
{
    reporter.step_started(step);
    info!("Running step '{}' (timeout {:?})", step, step.timeout());

    let output = session.exec(&step.command(), step.timeout()).await?;
    debug!("Step '{}' exited with {:?}", step, output.exit_code);

    if !output.success() {
        return Err(DeployError::RemoteStepFailed {
            step,
            exit_code: output.exit_code,
            output: output.combined_output(),
        });
    }

    reporter.step_finished(step, &output);
    Ok(output)
}

/// Best-effort close; failures are logged, never returned
pub async fn disconnect<S>(session: &mut S)
where
    S: RemoteShell + ?Sized,
{
    if let Err(e) = session.close().await {
        warn!("Failed to close SSH session: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NoopReporter;

    /// Scripted shell recording every command it receives
    #[derive(Default)]
    struct FakeShell {
        responses: Vec<Result<CommandOutput>>,
        commands: Vec<(String, Duration)>,
        closes: usize,
    }

    impl FakeShell {
        fn with(responses: Vec<Result<CommandOutput>>) -> Self {
            Self {
                responses,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl RemoteShell for FakeShell {
        async fn exec(&mut self, command: &str, timeout: Duration) -> Result<CommandOutput> {
            self.commands.push((command.to_string(), timeout));
            if self.responses.is_empty() {
                Ok(CommandOutput::ok(""))
            } else {
                self.responses.remove(0)
            }
        }

        async fn close(&mut self) -> Result<()> {
            self.closes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_step_timeouts() {
        assert_eq!(Step::Upload.timeout(), Duration::from_secs(5));
        assert_eq!(Step::Provision.timeout(), Duration::from_secs(300));
        assert_eq!(Step::Verify.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_step_commands() {
        assert!(Step::Upload.command().starts_with("cat > /tmp/deploy.sh << '"));
        assert_eq!(Step::Provision.command(), "bash /tmp/deploy.sh");
        assert!(Step::Verify.command().ends_with("docker-compose.yml ps"));
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let mut shell = FakeShell::with(vec![
            Ok(CommandOutput::ok("")),
            Ok(CommandOutput::ok("deployed")),
            Ok(CommandOutput::ok("web  running")),
        ]);

        let output = run_provisioning(&mut shell, &mut NoopReporter).await.unwrap();

        let sent: Vec<String> = shell.commands.iter().map(|(c, _)| c.clone()).collect();
        let expected: Vec<String> = Step::ALL.iter().map(Step::command).collect();
        assert_eq!(sent, expected);
        assert_eq!(output.provision.stdout, "deployed");
        assert_eq!(output.verify.stdout, "web  running");

        let timeouts: Vec<Duration> = shell.commands.iter().map(|(_, t)| *t).collect();
        assert_eq!(
            timeouts,
            vec![
                Duration::from_secs(5),
                Duration::from_secs(300),
                Duration::from_secs(10)
            ]
        );
    }

    #[tokio::test]
    async fn test_transport_error_stops_later_steps() {
        let mut shell = FakeShell::with(vec![Err(DeployError::remote("broken pipe"))]);

        let err = run_provisioning(&mut shell, &mut NoopReporter).await.unwrap_err();
        assert!(matches!(err, DeployError::RemoteCommand(_)));
        assert_eq!(shell.commands.len(), 1);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_step_failure() {
        let mut shell = FakeShell::with(vec![
            Ok(CommandOutput::ok("")),
            Ok(CommandOutput {
                stdout: "[1/5] Updating system...\n".to_string(),
                stderr: "E: dpkg was interrupted".to_string(),
                exit_code: Some(100),
            }),
        ]);

        let err = run_provisioning(&mut shell, &mut NoopReporter).await.unwrap_err();
        match err {
            DeployError::RemoteStepFailed {
                step,
                exit_code,
                output,
            } => {
                assert_eq!(step, Step::Provision);
                assert_eq!(exit_code, Some(100));
                assert!(output.contains("dpkg was interrupted"));
            }
            other => panic!("expected RemoteStepFailed, got {:?}", other),
        }
        assert_eq!(shell.commands.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_exit_status_is_step_failure() {
        let mut shell = FakeShell::with(vec![Ok(CommandOutput::default())]);

        let err = run_step(&mut shell, Step::Upload, &mut NoopReporter)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeployError::RemoteStepFailed {
                step: Step::Upload,
                exit_code: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_disconnect_swallows_close_error() {
        struct FailingClose;

        #[async_trait]
        impl RemoteShell for FailingClose {
            async fn exec(&mut self, _: &str, _: Duration) -> Result<CommandOutput> {
                Ok(CommandOutput::ok(""))
            }

            async fn close(&mut self) -> Result<()> {
                Err(DeployError::remote("already gone"))
            }
        }

        disconnect(&mut FailingClose).await;
    }
}
