//! vm-deploy - Entry point
//!
//! Parses CLI arguments, loads and validates the deployment config, runs the
//! provisioning sequence and maps the outcome to the process exit status.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vm_deploy::config::{load_config, resolve_config_path, Args, Settings};
use vm_deploy::credentials::{ConfigCredentials, EnvCredentials};
use vm_deploy::deployer::{Deployer, SshConnector};
use vm_deploy::error::Result;
use vm_deploy::report::{self, ConsoleReporter, Stage};
use vm_deploy::ssh::HostKeyVerifier;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the operator-facing banners
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    FmtSubscriber::builder()
        .with_env_filter(log_filter(directives.as_deref(), args.verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

/// `RUST_LOG` directives (default `info`), raised to `debug` by `--verbose`
fn log_filter(directives: Option<&str>, verbose: bool) -> EnvFilter {
    let filter = directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    if verbose {
        filter.add_directive(LevelFilter::DEBUG.into())
    } else {
        filter
    }
}

async fn run(args: Args) -> Result<()> {
    println!("{}", report::title_banner());
    info!("vm-deploy v{} starting...", env!("CARGO_PKG_VERSION"));

    println!("{}", Stage::LoadConfig.line());
    let config_path = resolve_config_path(args.config.as_deref());
    let config = load_config(&config_path).inspect_err(|e| println!("Error: {}", e))?;

    let credentials = EnvCredentials::new(ConfigCredentials::new(&config));
    let settings =
        Settings::resolve(&config, &credentials).inspect_err(|e| println!("Error: {}", e))?;
    println!("{}", report::target_line(&settings));
    println!();

    info!(
        "Host key checking: {}, target {}:{}",
        args.host_key_checking, settings.host, settings.ssh_port
    );

    println!("{}", Stage::Connect.line());
    let connector = SshConnector::new(HostKeyVerifier::new(
        args.host_key_checking,
        args.known_hosts,
    ));
    let deployer = Deployer::new(connector);

    match deployer.deploy(&settings, &mut ConsoleReporter).await {
        Ok(output) => {
            report::report(&settings, &output);
            Ok(())
        }
        Err(e) if e.is_connection_failure() => {
            println!(
                "{}",
                report::connection_failure(&e, settings.ssh_port, &config_path)
            );
            Err(e)
        }
        Err(e) => {
            println!("{}", report::deployment_failure(&e));
            Err(e)
        }
    }
}
