// ABOUTME: Check command implementation.
// ABOUTME: Connects, probes liveness, and disconnects.

use appdeploy::config::Config;
use appdeploy::error::{Error, Result};
use appdeploy::output::Output;

use super::open_session;

pub async fn check(config: Config, mut output: Output) -> Result<()> {
    let endpoint = config.connection.endpoint();
    output.start_timer();
    output.progress(&format!("Connecting to {endpoint}..."));

    let mut session = open_session(&config).await?;
    let alive = session.is_connected().await;
    session.disconnect().await;

    if !alive {
        return Err(Error::NotAlive(endpoint.to_string()));
    }
    output.success(&format!("Connected to {endpoint}"));
    Ok(())
}
