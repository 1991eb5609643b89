// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use std::path::PathBuf;

use appdeploy::config::BuildStatus;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "appdeploy")]
#[command(about = "Deploy enterprise applications to a managed application server cell")]
#[command(version)]
pub struct Cli {
    /// Config file (default: appdeploy.yml, appdeploy.yaml or .appdeploy/config.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Show debug logs and full error chains
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines for scripting
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new appdeploy.yml configuration file
    Init {
        /// Management server host name
        #[arg(long)]
        host: Option<String>,

        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Deploy every configured artifact
    Deploy {
        /// Result of the build that produced the artifacts
        #[arg(long, value_enum, default_value_t = BuildStatus::Success)]
        build_status: BuildStatus,
    },

    /// List the servers applications can be deployed to
    Servers,

    /// Test the connection to the management server
    Check,
}
