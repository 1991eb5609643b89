// ABOUTME: Test support utilities.
// ABOUTME: Tracing setup plus helpers for driving deployments against the simulated server.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Duration;

use appdeploy::artifact::ArtifactBuilder;
use appdeploy::connection::ConnectionManager;
use appdeploy::deploy::{DeploySettings, DistributionSettings, Orchestrator};
use appdeploy::remote::simulated::SimulatedServer;
use appdeploy::remote::{ConnectorType, Endpoint};
use appdeploy::types::DeployTarget;

static TRACING_INIT: Once = Once::new();

/// The single application server every simulated cell starts with.
#[allow(dead_code)]
pub const DEFAULT_TARGET: &str = "WebSphere:cell=cell01,node=node01,server=server1";

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("appdeploy=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[allow(dead_code)]
pub fn endpoint() -> Endpoint {
    Endpoint {
        host: "localhost".to_string(),
        port: 8879,
        connector: ConnectorType::Simulated,
    }
}

/// Settings with short bounds so failure paths finish quickly.
#[allow(dead_code)]
pub fn fast_settings() -> DeploySettings {
    DeploySettings {
        deployment_timeout: Duration::from_secs(5),
        distribution: DistributionSettings {
            poll_interval: Duration::from_millis(20),
            cycle_timeout: Duration::from_secs(1),
        },
        ..DeploySettings::default()
    }
}

#[allow(dead_code)]
pub fn orchestrator(server: &Arc<SimulatedServer>, settings: DeploySettings) -> Orchestrator {
    let connection = ConnectionManager::new(Arc::new(server.connector()));
    Orchestrator::new(connection, endpoint(), None, settings)
}

/// Write a placeholder archive; the simulated server never opens it.
#[allow(dead_code)]
pub fn write_archive(dir: &Path, file_name: &str) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, b"PK\x03\x04 placeholder archive").unwrap();
    path
}

/// An artifact aimed at the default server, with its name left for discovery.
#[allow(dead_code)]
pub fn artifact(path: &Path) -> ArtifactBuilder {
    ArtifactBuilder::new(path).target(DeployTarget::parse(DEFAULT_TARGET).unwrap())
}
