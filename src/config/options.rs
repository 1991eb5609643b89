// ABOUTME: Run-wide deployment options from the `options` section.
// ABOUTME: Also holds the build-status gate deciding whether a run may start.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::artifact::DEFAULT_EAR_LEVEL;
use crate::deploy::{DEFAULT_DEPLOYMENT_TIMEOUT, DistributionSettings, OperationMode};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OptionsConfig {
    pub mode: OperationMode,
    /// Keep deployed archives and restore them when a later deployment fails.
    pub rollback: bool,
    pub rollback_dir: PathBuf,
    #[serde(with = "humantime_serde")]
    pub deployment_timeout: Duration,
    pub distribution: DistributionSettings,
    pub ear_level: String,
    pub precompile: bool,
    pub reloading: bool,
    pub jsp_reloading: bool,
    pub distribute: bool,
    pub virtual_host: Option<String>,
    pub edition: Option<String>,
    pub shared_libraries: Vec<String>,
    pub proceed_on_unstable: bool,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            mode: OperationMode::default(),
            rollback: false,
            rollback_dir: PathBuf::from(".appdeploy/rollback"),
            deployment_timeout: DEFAULT_DEPLOYMENT_TIMEOUT,
            distribution: DistributionSettings::default(),
            ear_level: DEFAULT_EAR_LEVEL.to_string(),
            precompile: false,
            reloading: false,
            jsp_reloading: false,
            distribute: true,
            virtual_host: None,
            edition: None,
            shared_libraries: Vec::new(),
            proceed_on_unstable: false,
        }
    }
}

/// Result of the build that produced the artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BuildStatus {
    #[default]
    Success,
    Unstable,
    Failure,
}

impl OptionsConfig {
    /// Whether a build with this status may be deployed.
    pub fn allows(&self, status: BuildStatus) -> bool {
        match status {
            BuildStatus::Success => true,
            BuildStatus::Unstable => self.proceed_on_unstable,
            BuildStatus::Failure => false,
        }
    }
}
