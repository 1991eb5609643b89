// ABOUTME: State transition methods for one artifact deployment.
// ABOUTME: Each method consumes self and returns the next state on success.

use std::future::Future;
use std::time::Duration;

use crate::artifact::{Artifact, ArtifactType, AttributeSet, DeploymentOptions};
use crate::diagnostics::{Diagnostics, Warning};
use crate::remote::{ClientHandle, RemoteError, TaskName};
use crate::types::AppName;

use super::Deployment;
use super::deployment::DeploySettings;
use super::distribution::DistributionPoller;
use super::error::{DeployError, Operation};
use super::report::ArtifactOutcome;
use super::rollback::{RollbackOutcome, RollbackStore};
use super::state::{
    Configured, Connected, Distributed, Failed, Installed, RollingBack, Started, Stopped,
};
use super::strategy::InstallPlan;
use super::subscription::{NotificationSubscription, TerminalOutcome};

/// Result type for transitions that may need rollback on failure.
pub type TransitionResult<T, S> = Result<Deployment<T>, (Deployment<S>, DeployError)>;

// =============================================================================
// Tracked operations
// =============================================================================

/// Subscribe, issue the request, then wait for its terminal notification.
///
/// The subscription exists before `submit` runs so a fast server cannot
/// complete the task unobserved.
async fn run_tracked<F, Fut>(
    client: &ClientHandle,
    watched: &[TaskName],
    operation: Operation,
    app: &AppName,
    timeout: Duration,
    submit: F,
) -> Result<(), DeployError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), RemoteError>>,
{
    let subscription = NotificationSubscription::create(client, watched, app.as_str()).await?;

    submit()
        .await
        .map_err(|e| DeployError::remote(operation, app, e))?;

    let outcome = subscription.wait(timeout).await;
    subscription.unsubscribe();

    match outcome {
        TerminalOutcome::Succeeded => {
            tracing::debug!(%app, %operation, "task completed");
            Ok(())
        }
        TerminalOutcome::Failed => Err(DeployError::task_failed(
            operation,
            app,
            subscription.message_log(),
        )),
        TerminalOutcome::Pending => Err(DeployError::OperationTimedOut {
            operation,
            app: app.clone(),
            timeout,
        }),
    }
}

fn ensure_ear(artifact: &Artifact) -> Result<(), DeployError> {
    if artifact.kind() == ArtifactType::Ear {
        Ok(())
    } else {
        Err(DeployError::InvalidArtifact(format!(
            "{} is not an enterprise archive",
            artifact.source_path().display()
        )))
    }
}

pub(crate) async fn install_artifact(
    client: &ClientHandle,
    artifact: &Artifact,
    timeout: Duration,
) -> Result<(), DeployError> {
    let options = DeploymentOptions::for_install(artifact);
    let app = artifact.app_name();
    tracing::info!(%app, target = %artifact.target(), "installing");
    run_tracked(
        client,
        &[TaskName::Install],
        Operation::Install,
        app,
        timeout,
        || client.install_application(artifact.source_path(), app, &options),
    )
    .await
}

pub(crate) async fn redeploy_artifact(
    client: &ClientHandle,
    artifact: &Artifact,
    timeout: Duration,
) -> Result<(), DeployError> {
    let options = DeploymentOptions::for_install(artifact);
    let app = artifact.app_name();
    tracing::info!(%app, target = %artifact.target(), "updating");
    // Some server versions report a redeploy as an install task.
    run_tracked(
        client,
        &[TaskName::Update, TaskName::Install],
        Operation::Update,
        app,
        timeout,
        || client.redeploy_application(artifact.source_path(), app, &options),
    )
    .await
}

pub(crate) async fn uninstall_app(
    client: &ClientHandle,
    app: &AppName,
    timeout: Duration,
) -> Result<(), DeployError> {
    let options = DeploymentOptions::new();
    tracing::info!(%app, "uninstalling");
    run_tracked(
        client,
        &[TaskName::Uninstall],
        Operation::Uninstall,
        app,
        timeout,
        || client.uninstall_application(app, &options),
    )
    .await
}

/// Carry out `plan` for `artifact`. Archives the server cannot take are
/// rejected before anything is removed.
pub(crate) async fn apply_plan(
    client: &ClientHandle,
    plan: InstallPlan,
    artifact: &Artifact,
    settings: &DeploySettings,
) -> Result<(), DeployError> {
    if settings.server.requires_ear() {
        ensure_ear(artifact)?;
    }
    let timeout = settings.deployment_timeout;

    match plan {
        InstallPlan::Reinstall => {
            uninstall_app(client, artifact.app_name(), timeout).await?;
            install_artifact(client, artifact, timeout).await
        }
        InstallPlan::FreshInstall => install_artifact(client, artifact, timeout).await,
        InstallPlan::Redeploy => redeploy_artifact(client, artifact, timeout).await,
    }
}

pub(crate) async fn start_app(
    client: &ClientHandle,
    app: &AppName,
) -> Result<Vec<String>, DeployError> {
    let started = client
        .start_application(app, &DeploymentOptions::new())
        .await
        .map_err(|e| DeployError::remote(Operation::Start, app, e))?;

    match started {
        Some(targets) if !targets.is_empty() => {
            tracing::info!(%app, targets = %targets.join(", "), "started");
            Ok(targets)
        }
        _ => Err(DeployError::StartFailed(app.clone())),
    }
}

// =============================================================================
// Connected -> Stopped
// =============================================================================

impl Deployment<Connected> {
    /// Stop the application if it is already installed.
    ///
    /// A server that reports the application as not installed while stopping
    /// is treated as nothing to stop.
    pub async fn stop_existing(self, client: &ClientHandle) -> TransitionResult<Stopped, Connected> {
        let app = self.artifact.app_name().clone();
        let options = DeploymentOptions::new();

        let installed = match client.check_if_app_exists(&app, &options).await {
            Ok(installed) => installed,
            Err(e) => return Err((self, DeployError::remote(Operation::Stop, &app, e))),
        };

        if installed {
            match client.stop_application(&app, &options).await {
                Ok(stopped) => {
                    tracing::info!(%app, targets = ?stopped.unwrap_or_default(), "stopped");
                }
                Err(RemoteError::NotInstalled(_)) => {
                    tracing::debug!(%app, "not installed; nothing to stop");
                }
                Err(e) => return Err((self, DeployError::remote(Operation::Stop, &app, e))),
            }
        }

        Ok(self.transition(Stopped {
            was_installed: installed,
        }))
    }
}

// =============================================================================
// Stopped -> Installed
// =============================================================================

impl Deployment<Stopped> {
    /// Install, reinstall or redeploy according to the configured mode.
    pub async fn install_or_update(
        self,
        client: &ClientHandle,
    ) -> TransitionResult<Installed, Stopped> {
        let plan = InstallPlan::for_mode(self.settings.effective_mode(), self.state.was_installed);
        let result = apply_plan(client, plan, &self.artifact, &self.settings).await;

        match result {
            Ok(()) => Ok(self.transition(Installed { plan })),
            Err(e) => Err((self, e)),
        }
    }
}

// =============================================================================
// Installed -> Configured
// =============================================================================

impl Deployment<Installed> {
    /// Apply post-install attributes. A rejected update becomes a warning and
    /// the deployment carries on.
    pub async fn apply_attributes(
        self,
        client: &ClientHandle,
        diagnostics: &mut Diagnostics,
    ) -> Deployment<Configured> {
        let attributes = AttributeSet::for_artifact(&self.artifact);
        if !attributes.is_empty() {
            let app = self.artifact.app_name();
            match client.apply_attributes(app, &attributes).await {
                Ok(()) => tracing::debug!(%app, "attributes applied"),
                Err(e) => diagnostics.warn(Warning::attribute_apply(format!(
                    "could not apply attributes to {app}: {e}"
                ))),
            }
        }
        self.transition(Configured)
    }
}

// =============================================================================
// Configured -> Distributed
// =============================================================================

impl Deployment<Configured> {
    /// Wait until every node reports the binaries distributed.
    pub async fn wait_for_distribution(
        self,
        poller: &DistributionPoller,
    ) -> TransitionResult<Distributed, Configured> {
        let timeout = self.settings.deployment_timeout;
        match poller
            .wait_for_distribution(self.artifact.app_name(), timeout)
            .await
        {
            Ok(true) => Ok(self.transition(Distributed)),
            Ok(false) => {
                let app = self.artifact.app_name().clone();
                Err((self, DeployError::DistributionIncomplete { app, timeout }))
            }
            Err(e) => Err((self, e)),
        }
    }
}

// =============================================================================
// Distributed -> Started
// =============================================================================

impl Deployment<Distributed> {
    pub async fn start(self, client: &ClientHandle) -> TransitionResult<Started, Distributed> {
        match start_app(client, self.artifact.app_name()).await {
            Ok(targets) => Ok(self.transition(Started { targets })),
            Err(e) => Err((self, e)),
        }
    }
}

// =============================================================================
// Started -> outcome
// =============================================================================

impl Deployment<Started> {
    /// Keep a copy of the deployed archive for later rollbacks and report success.
    pub async fn finish(
        self,
        store: Option<&RollbackStore>,
        diagnostics: &mut Diagnostics,
    ) -> ArtifactOutcome {
        if let Some(store) = store {
            if let Err(e) = store.save(&self.artifact).await {
                diagnostics.warn(Warning::rollback_save(format!(
                    "could not keep a rollback copy of {}: {e}",
                    self.artifact.app_name()
                )));
            }
        }

        ArtifactOutcome::Deployed {
            app: self.artifact.app_name().clone(),
            archive: self.artifact.source_path().to_path_buf(),
            targets: self.state.targets,
        }
    }
}

// =============================================================================
// Failed -> RollingBack -> Failed
// =============================================================================

impl Deployment<Failed> {
    /// Restore the last saved archive, keeping the original failure.
    pub async fn rollback(
        self,
        client: &ClientHandle,
        store: &RollbackStore,
        poller: &DistributionPoller,
    ) -> Deployment<Failed> {
        self.begin_rollback().run(client, store, poller).await
    }

    pub fn begin_rollback(self) -> Deployment<RollingBack> {
        let Deployment {
            artifact,
            settings,
            state,
        } = self;
        Deployment {
            artifact,
            settings,
            state: RollingBack { failed: state },
        }
    }

    pub fn into_outcome(self) -> ArtifactOutcome {
        ArtifactOutcome::Failed {
            label: self.artifact.app_name().to_string(),
            operation: self.state.operation,
            error: self.state.error,
            rollback: self.state.rollback,
        }
    }
}

impl Deployment<RollingBack> {
    /// Put the last saved archive back. The original failure is kept; the
    /// rollback result is recorded next to it.
    pub async fn run(
        self,
        client: &ClientHandle,
        store: &RollbackStore,
        poller: &DistributionPoller,
    ) -> Deployment<Failed> {
        let app = self.artifact.app_name().clone();
        tracing::info!(%app, "rolling back to the last deployed archive");

        let outcome = match self.restore(client, store, poller).await {
            Ok(true) => {
                tracing::info!(%app, "rollback restored the previous archive");
                RollbackOutcome::Restored
            }
            Ok(false) => {
                tracing::info!(%app, "no saved archive; nothing to roll back to");
                RollbackOutcome::NothingSaved
            }
            Err(e) => {
                tracing::error!(%app, error = %e, "rollback failed");
                RollbackOutcome::Failed(e.to_string())
            }
        };

        let Deployment {
            artifact,
            settings,
            state,
        } = self;
        let mut failed = state.failed;
        failed.rollback = outcome;
        Deployment {
            artifact,
            settings,
            state: failed,
        }
    }

    async fn restore(
        &self,
        client: &ClientHandle,
        store: &RollbackStore,
        poller: &DistributionPoller,
    ) -> Result<bool, DeployError> {
        let app = self.artifact.app_name();
        let Some(saved) = store.find(app).await? else {
            return Ok(false);
        };

        let previous = self.artifact.with_source(store.path_of(&saved));
        let timeout = self.settings.deployment_timeout;

        let installed = client
            .check_if_app_exists(app, &DeploymentOptions::new())
            .await
            .map_err(|e| DeployError::remote(Operation::Install, app, e))?;
        let plan = InstallPlan::for_mode(self.settings.effective_mode(), installed);
        apply_plan(client, plan, &previous, &self.settings).await?;

        if !poller.wait_for_distribution(app, timeout).await? {
            return Err(DeployError::DistributionIncomplete {
                app: app.clone(),
                timeout,
            });
        }

        start_app(client, app).await?;
        Ok(true)
    }
}
