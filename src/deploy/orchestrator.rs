// ABOUTME: Runs every configured artifact through the deployment state machine.
// ABOUTME: Owns the session, prepares archives, and turns failures into rollbacks and outcomes.

use std::sync::Arc;

use crate::artifact::{Artifact, ArtifactBuilder, ArtifactType, ArchivePackager, EarPackager};
use crate::connection::ConnectionManager;
use crate::diagnostics::{Diagnostics, Warning};
use crate::remote::{ClientHandle, Credentials, Endpoint};
use crate::types::AppName;

use super::Deployment;
use super::deployment::DeploySettings;
use super::distribution::DistributionPoller;
use super::error::{DeployError, Operation};
use super::report::{ArtifactOutcome, RunReport, render_error};
use super::rollback::{RollbackOutcome, RollbackStore};
use super::state::{Connected, Failed, Started};

/// Deploys a list of artifacts, one after another, over a single session.
pub struct Orchestrator {
    connection: ConnectionManager,
    endpoint: Endpoint,
    credentials: Option<Credentials>,
    settings: DeploySettings,
    rollback: Option<RollbackStore>,
    packager: Arc<dyn ArchivePackager>,
}

impl Orchestrator {
    pub fn new(
        connection: ConnectionManager,
        endpoint: Endpoint,
        credentials: Option<Credentials>,
        settings: DeploySettings,
    ) -> Self {
        Self {
            connection,
            endpoint,
            credentials,
            settings,
            rollback: None,
            packager: Arc::new(EarPackager::default()),
        }
    }

    /// Keep a copy of each deployed archive and restore it when a later deployment fails.
    pub fn with_rollback_store(mut self, store: RollbackStore) -> Self {
        self.rollback = Some(store);
        self
    }

    pub fn with_packager(mut self, packager: Arc<dyn ArchivePackager>) -> Self {
        self.packager = packager;
        self
    }

    /// Deploy every artifact. Failures are recorded per artifact and never stop the run.
    pub async fn run(&mut self, artifacts: Vec<ArtifactBuilder>) -> RunReport {
        let mut diagnostics = Diagnostics::default();

        if let Err(e) = self
            .connection
            .connect(&self.endpoint, self.credentials.as_ref())
            .await
        {
            tracing::error!(endpoint = %self.endpoint, error = %e, "cannot connect to management server");
            return RunReport {
                outcomes: Vec::new(),
                warnings: diagnostics.into_warnings(),
                fatal: Some(e.into()),
            };
        }

        let mut outcomes = Vec::with_capacity(artifacts.len());
        for builder in artifacts {
            let outcome = self.deploy_one(builder, &mut diagnostics).await;
            outcomes.push(outcome);
        }

        self.connection.disconnect().await;

        RunReport {
            outcomes,
            warnings: diagnostics.into_warnings(),
            fatal: None,
        }
    }

    async fn deploy_one(
        &mut self,
        builder: ArtifactBuilder,
        diagnostics: &mut Diagnostics,
    ) -> ArtifactOutcome {
        let label = builder.label();

        let client = match self.connection.ensure_connected().await {
            Ok(client) => client,
            Err(e) => return self.failed_early(label, Operation::Connect, e.into()),
        };

        let artifact = match self.prepare(&client, builder).await {
            Ok(artifact) => artifact,
            Err(e) => return self.failed_early(label, Operation::Prepare, e),
        };

        tracing::info!(
            app = %artifact.app_name(),
            archive = %artifact.source_path().display(),
            "deploying"
        );

        let poller = DistributionPoller::new(client.clone(), self.settings.distribution);
        let deployment = Deployment::new(artifact, self.settings.clone());

        match drive(deployment, &client, &poller, diagnostics).await {
            Ok(started) => started.finish(self.rollback.as_ref(), diagnostics).await,
            Err(failed) => {
                tracing::error!(
                    app = %failed.app_name(),
                    operation = %failed.operation(),
                    error = %render_error(failed.error(), self.settings.verbose),
                    "deployment failed"
                );
                let failed = match &self.rollback {
                    Some(store) => {
                        let failed = failed.rollback(&client, store, &poller).await;
                        if let RollbackOutcome::Failed(reason) = failed.rollback_outcome() {
                            diagnostics.warn(Warning::rollback_failed(format!(
                                "rollback of {} failed: {reason}",
                                failed.app_name()
                            )));
                        }
                        failed
                    }
                    None => failed,
                };
                failed.into_outcome()
            }
        }
    }

    fn failed_early(&self, label: String, operation: Operation, error: DeployError) -> ArtifactOutcome {
        tracing::error!(
            artifact = %label,
            %operation,
            error = %render_error(&error, self.settings.verbose),
            "deployment failed"
        );
        ArtifactOutcome::Failed {
            label,
            operation,
            error,
            rollback: RollbackOutcome::NotAttempted,
        }
    }

    /// Settle the application name, then wrap non-EAR inputs into an EAR when
    /// the server only takes enterprise archives.
    async fn prepare(
        &self,
        client: &ClientHandle,
        builder: ArtifactBuilder,
    ) -> Result<Artifact, DeployError> {
        let builder = if builder.has_app_name() {
            builder
        } else {
            let name = discover_app_name(client, &builder).await?;
            tracing::debug!(app = %name, "application name discovered");
            builder.app_name(name)
        };

        let artifact = builder
            .build()
            .map_err(|e| DeployError::InvalidArtifact(e.to_string()))?;

        if !artifact.kind().needs_wrapping() || !self.settings.server.requires_ear() {
            return Ok(artifact);
        }

        let packager = Arc::clone(&self.packager);
        let wrapped = tokio::task::spawn_blocking(move || packager.wrap(&artifact))
            .await
            .map_err(|e| DeployError::InvalidArtifact(format!("packaging task failed: {e}")))??;
        tracing::info!(
            app = %wrapped.app_name(),
            ear = %wrapped.source_path().display(),
            "wrapped module into an enterprise archive"
        );
        Ok(wrapped)
    }
}

/// The name recorded in an EAR, otherwise the file stem.
async fn discover_app_name(
    client: &ClientHandle,
    builder: &ArtifactBuilder,
) -> Result<AppName, DeployError> {
    let raw = if builder.kind() == ArtifactType::Ear {
        client
            .read_application_name(builder.source_path())
            .await
            .map_err(|source| DeployError::NameDiscovery {
                path: builder.source_path().to_path_buf(),
                source,
            })?
    } else {
        builder
            .file_stem()
            .ok_or_else(|| {
                DeployError::InvalidArtifact(format!(
                    "{} has no file name",
                    builder.source_path().display()
                ))
            })?
            .to_string()
    };

    AppName::new(raw.trim())
        .map_err(|e| DeployError::InvalidArtifact(format!("application name {raw:?}: {e}")))
}

/// Run the state machine from `Connected` to `Started`.
async fn drive(
    deployment: Deployment<Connected>,
    client: &ClientHandle,
    poller: &DistributionPoller,
    diagnostics: &mut Diagnostics,
) -> Result<Deployment<Started>, Deployment<Failed>> {
    let deployment = deployment
        .stop_existing(client)
        .await
        .map_err(|(d, e)| d.fail(Operation::Stop, e))?;

    let deployment = deployment
        .install_or_update(client)
        .await
        .map_err(|(d, e)| d.fail(Operation::Install, e))?;
    tracing::debug!(app = %deployment.app_name(), plan = ?deployment.plan(), "installed");

    let deployment = deployment.apply_attributes(client, diagnostics).await;

    let deployment = deployment
        .wait_for_distribution(poller)
        .await
        .map_err(|(d, e)| d.fail(Operation::Distribution, e))?;

    deployment
        .start(client)
        .await
        .map_err(|(d, e)| d.fail(Operation::Start, e))
}
