// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: Holds the prepared artifact and run settings that every state shares.

use std::time::Duration;

use crate::artifact::Artifact;
use crate::remote::ServerKind;
use crate::types::AppName;

use super::distribution::DistributionSettings;
use super::error::{DeployError, Operation};
use super::rollback::RollbackOutcome;
use super::state::{Connected, Failed, Installed, Started, Stopped};
use super::strategy::{InstallPlan, OperationMode};

/// Default bound for each tracked operation and for distribution as a whole.
pub const DEFAULT_DEPLOYMENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Settings shared by every artifact in a run.
#[derive(Debug, Clone)]
pub struct DeploySettings {
    pub server: ServerKind,
    pub mode: OperationMode,
    pub deployment_timeout: Duration,
    pub distribution: DistributionSettings,
    /// Render full error chains in reports and logs.
    pub verbose: bool,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            server: ServerKind::default(),
            mode: OperationMode::default(),
            deployment_timeout: DEFAULT_DEPLOYMENT_TIMEOUT,
            distribution: DistributionSettings::default(),
            verbose: false,
        }
    }
}

impl DeploySettings {
    /// The configured mode, unless the server cannot update in place.
    pub fn effective_mode(&self) -> OperationMode {
        if self.server.supports_update() {
            self.mode
        } else {
            OperationMode::Reinstall
        }
    }
}

/// A deployment of one artifact, parameterized by its current state.
///
/// The state type parameter `S` carries state-specific data (the install plan,
/// the started targets, the failure) so later steps can only run once the
/// earlier ones produced what they need.
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) artifact: Artifact,
    pub(crate) settings: DeploySettings,
    pub(crate) state: S,
}

impl Deployment<Connected> {
    /// Start a deployment for a prepared artifact.
    pub fn new(artifact: Artifact, settings: DeploySettings) -> Self {
        Deployment {
            artifact,
            settings,
            state: Connected,
        }
    }
}

impl<S> Deployment<S> {
    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn app_name(&self) -> &AppName {
        self.artifact.app_name()
    }

    pub fn settings(&self) -> &DeploySettings {
        &self.settings
    }

    pub(crate) fn transition<T>(self, state: T) -> Deployment<T> {
        Deployment {
            artifact: self.artifact,
            settings: self.settings,
            state,
        }
    }

    /// Move to `Failed`. The error's own operation wins over `during` when it names one.
    pub fn fail(self, during: Operation, error: DeployError) -> Deployment<Failed> {
        let operation = error.operation().unwrap_or(during);
        self.transition(Failed {
            operation,
            error,
            rollback: RollbackOutcome::NotAttempted,
        })
    }
}

impl Deployment<Stopped> {
    /// Whether the application existed before this deployment.
    pub fn was_installed(&self) -> bool {
        self.state.was_installed
    }
}

impl Deployment<Installed> {
    pub fn plan(&self) -> InstallPlan {
        self.state.plan
    }
}

impl Deployment<Started> {
    /// Targets the start operation reported.
    pub fn targets(&self) -> &[String] {
        &self.state.targets
    }
}

impl Deployment<Failed> {
    pub fn operation(&self) -> Operation {
        self.state.operation
    }

    pub fn error(&self) -> &DeployError {
        &self.state.error
    }

    pub fn rollback_outcome(&self) -> &RollbackOutcome {
        &self.state.rollback
    }
}
