//! Console output for a deployment run
//!
//! Banners and progress lines go to stdout; diagnostics go through
//! `tracing` to stderr.

use std::path::Path;

use tracing::debug;

use crate::config::Settings;
use crate::deployer::{RemoteOutput, Step};
use crate::error::DeployError;
use crate::ssh::CommandOutput;

const RULE_WIDTH: usize = 50;

/// Numbered progress stages shown to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadConfig,
    Connect,
    PrepareScript,
    Deploy,
    Verify,
}

impl Stage {
    /// Stage announced when `step` starts
    pub fn for_step(step: Step) -> Self {
        match step {
            Step::Upload => Stage::PrepareScript,
            Step::Provision => Stage::Deploy,
            Step::Verify => Stage::Verify,
        }
    }

    pub fn number(&self) -> usize {
        match self {
            Stage::LoadConfig => 1,
            Stage::Connect => 2,
            Stage::PrepareScript => 3,
            Stage::Deploy => 4,
            Stage::Verify => 5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::LoadConfig => "Loading configuration...",
            Stage::Connect => "Connecting to VM...",
            Stage::PrepareScript => "Preparing deployment script...",
            Stage::Deploy => "Deploying application...",
            Stage::Verify => "Verifying deployment...",
        }
    }

    /// e.g. `[2/5] Connecting to VM...`
    pub fn line(&self) -> String {
        format!("[{}/5] {}", self.number(), self.label())
    }
}

/// Receives progress events from [`Deployer`](crate::deployer::Deployer)
pub trait Reporter: Send {
    fn connected(&mut self, _settings: &Settings) {}

    fn step_started(&mut self, _step: Step) {}

    fn step_finished(&mut self, _step: Step, _output: &CommandOutput) {}
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {}

/// Prints progress the way an operator watching the terminal expects
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn connected(&mut self, _settings: &Settings) {
        println!("  ✓ Connected successfully");
        println!();
    }

    fn step_started(&mut self, step: Step) {
        if step == Step::Verify {
            println!();
        }
        println!("{}", Stage::for_step(step).line());
    }

    fn step_finished(&mut self, step: Step, output: &CommandOutput) {
        // The upload produces no meaningful output
        if step != Step::Upload {
            println!("{}", output.combined_output());
        }
    }
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Title printed before anything else
pub fn title_banner() -> String {
    format!(
        "{rule}\nvm-deploy v{} - Automated Deployment\n{rule}\n",
        env!("CARGO_PKG_VERSION"),
        rule = rule()
    )
}

/// Printed under stage 1 once settings are valid
pub fn target_line(settings: &Settings) -> String {
    format!("  ✓ Target: {}", settings.target())
}

/// Connection failure message with remediation hints
pub fn connection_failure(err: &DeployError, ssh_port: u16, config_path: &Path) -> String {
    format!(
        "  ✗ Connection failed: {}\n  Please verify:\n    - VM is running\n    \
         - SSH port ({}) is open\n    - Credentials in {} are correct\n",
        err,
        ssh_port,
        config_path.display()
    )
}

/// Failure during stages 3-5, including the failing step's output
pub fn deployment_failure(err: &DeployError) -> String {
    match err {
        DeployError::RemoteStepFailed { output, .. } if !output.is_empty() => {
            format!("Error during deployment: {}\n{}", err, output)
        }
        _ => format!("Error during deployment: {}", err),
    }
}

/// Print the success banner for a completed run
pub fn report(settings: &Settings, output: &RemoteOutput) {
    debug!(
        "Verification listed {} line(s)",
        output.verify.stdout.lines().count()
    );
    println!("{}", success_banner(settings));
}

/// Final banner with access information
pub fn success_banner(settings: &Settings) -> String {
    let url = settings.access_url();
    let mut out = String::new();

    out.push('\n');
    out.push_str(&rule());
    out.push_str("\n✅ DEPLOYMENT SUCCESSFUL!\n");
    out.push_str(&rule());
    out.push_str("\n\nApplication is now running!\n\n");
    out.push_str("Access Information:\n");
    out.push_str(&format!("  URL: {}\n", url));
    out.push_str(&format!("  Email: {}\n", settings.admin_email));
    out.push_str(&format!("  Password: {}\n", settings.admin_password()));
    out.push_str("\nNext steps:\n");
    out.push_str("  1. Wait 30-60 seconds for services to initialize\n");
    out.push_str(&format!("  2. Open browser: {}\n", url));
    out.push_str("  3. Login with provided credentials\n");

    out
}
