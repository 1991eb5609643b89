// ABOUTME: Command module aggregator for the appdeploy CLI.
// ABOUTME: Re-exports deploy, servers, and check command handlers.

mod check;
mod deploy;
mod servers;

pub use check::check;
pub use deploy::deploy;
pub use servers::servers;

use appdeploy::config::Config;
use appdeploy::connection::{ConnectionManager, connector_for};
use appdeploy::error::Result;
use std::path::Path;

/// Load the config named on the command line, or discover it in `cwd`.
pub fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<Config> {
    match explicit {
        Some(path) => Config::load(path),
        None => Config::discover(cwd),
    }
}

/// Connect to the configured management server.
pub async fn open_session(config: &Config) -> Result<ConnectionManager> {
    let connector = connector_for(config.connection.connector, config.connection.server)?;
    let mut manager = ConnectionManager::new(connector);
    let credentials = config.connection.credentials()?;
    manager
        .connect(&config.connection.endpoint(), credentials.as_ref())
        .await?;
    Ok(manager)
}
