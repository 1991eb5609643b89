// ABOUTME: Configuration types and parsing for appdeploy.yml.
// ABOUTME: Handles YAML parsing, file discovery, and conversion into run inputs.

mod artifact;
mod connection;
mod deserialize;
mod env_value;
mod init;
mod options;

pub use artifact::{ArtifactConfig, DeploymentGroup, TargetEntry};
pub use connection::{ConnectionConfig, DEFAULT_SOAP_PORT, SecurityConfig};
pub use deserialize::DEFAULT_SENTINEL;
pub use env_value::{EnvValue, resolve_optional};
pub use init::init_config;
pub use options::{BuildStatus, OptionsConfig};

use crate::artifact::{ArtifactBuilder, EarPackager};
use crate::deploy::{DeploySettings, RollbackStore};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use deserialize::deserialize_deployments;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILENAME: &str = "appdeploy.yml";
pub const CONFIG_FILENAME_ALT: &str = "appdeploy.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".appdeploy/config.yml";

/// Set to `false` to turn deployments off without touching the config file.
pub const ENABLED_ENV: &str = "APPDEPLOY_ENABLED";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub connection: ConnectionConfig,

    #[serde(deserialize_with = "deserialize_deployments")]
    pub deployments: NonEmpty<DeploymentGroup>,

    #[serde(default)]
    pub options: OptionsConfig,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "using config file");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn deploy_settings(&self, verbose: bool) -> DeploySettings {
        DeploySettings {
            server: self.connection.server,
            mode: self.options.mode,
            deployment_timeout: self.options.deployment_timeout,
            distribution: self.options.distribution,
            verbose,
        }
    }

    /// The rollback store, when rollback is enabled. Relative dirs resolve against `base`.
    pub fn rollback_store(&self, base: &Path) -> Option<RollbackStore> {
        self.options
            .rollback
            .then(|| RollbackStore::new(base.join(&self.options.rollback_dir)))
    }

    pub fn packager(&self) -> EarPackager {
        EarPackager::new(self.options.ear_level.clone())
    }

    /// Every artifact of every deployment group, in declaration order.
    pub fn artifact_builders(
        &self,
        base: &Path,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<ArtifactBuilder>> {
        let mut builders = Vec::new();
        for group in self.deployments.iter() {
            builders.extend(group.builders(base, &self.options, diagnostics)?);
        }
        Ok(builders)
    }
}

/// False only when the enable switch is explicitly set to `false`.
pub fn deploy_enabled() -> bool {
    std::env::var(ENABLED_ENV)
        .map(|v| !v.trim().eq_ignore_ascii_case("false"))
        .unwrap_or(true)
}
