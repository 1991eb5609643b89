// ABOUTME: Servers command implementation.
// ABOUTME: Lists every server the management session can deploy to.

use appdeploy::config::Config;
use appdeploy::error::Result;
use appdeploy::output::Output;
use appdeploy::targets::{IndexedTarget, list_servers};

use super::open_session;

pub async fn servers(config: Config, output: Output) -> Result<()> {
    let mut session = open_session(&config).await?;

    let listing: Result<Vec<IndexedTarget>> = match session.client() {
        Ok(client) => list_servers(&client).await.map_err(Into::into),
        Err(e) => Err(e.into()),
    };
    session.disconnect().await;

    let servers = listing?;
    if servers.is_empty() {
        output.progress("No deployable servers found");
    }
    output.servers(&servers);
    Ok(())
}
