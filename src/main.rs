// ABOUTME: Entry point for the appdeploy CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use appdeploy::config;
use appdeploy::deploy::RunStatus;
use appdeploy::error::Result;
use appdeploy::output::{Output, OutputMode};
use clap::Parser;
use cli::{Cli, Commands};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    match run(cli, mode).await {
        Ok(status) => std::process::exit(status.exit_code()),
        Err(e) => {
            Output::new(mode).error(&e.to_string());
            std::process::exit(RunStatus::Failure.exit_code());
        }
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<RunStatus> {
    let cwd = env::current_dir()?;
    let output = Output::new(mode);

    match cli.command {
        Commands::Init { host, force } => {
            config::init_config(&cwd, host.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(RunStatus::Success)
        }
        Commands::Deploy { build_status } => {
            let config = commands::load_config(cli.config.as_deref(), &cwd)?;
            commands::deploy(config, build_status, &cwd, cli.verbose, output).await
        }
        Commands::Servers => {
            let config = commands::load_config(cli.config.as_deref(), &cwd)?;
            commands::servers(config, output).await?;
            Ok(RunStatus::Success)
        }
        Commands::Check => {
            let config = commands::load_config(cli.config.as_deref(), &cwd)?;
            commands::check(config, output).await?;
            Ok(RunStatus::Success)
        }
    }
}
