// ABOUTME: Deploy command implementation.
// ABOUTME: Applies the run gates, resolves artifacts and hands them to the orchestrator.

use appdeploy::config::{BuildStatus, Config, ENABLED_ENV, deploy_enabled};
use appdeploy::connection::{ConnectionManager, connector_for};
use appdeploy::deploy::{Orchestrator, RunStatus};
use appdeploy::diagnostics::Diagnostics;
use appdeploy::error::Result;
use appdeploy::output::Output;
use std::path::Path;
use std::sync::Arc;

/// Deploy every configured artifact and print the run summary.
pub async fn deploy(
    config: Config,
    build_status: BuildStatus,
    base: &Path,
    verbose: bool,
    mut output: Output,
) -> Result<RunStatus> {
    if !deploy_enabled() {
        tracing::info!("{ENABLED_ENV} is false; deployment turned off");
        output.success(&format!("Deployment turned off by {ENABLED_ENV}=false"));
        return Ok(RunStatus::Success);
    }

    if !config.options.allows(build_status) {
        output.success(&format!(
            "Build status is {build_status:?}; skipping deployment"
        ));
        return Ok(RunStatus::Success);
    }

    output.start_timer();
    let mut diag = Diagnostics::default();

    let builders = config.artifact_builders(base, &mut diag)?;
    let endpoint = config.connection.endpoint();
    let credentials = config.connection.credentials()?;
    let connector = connector_for(config.connection.connector, config.connection.server)?;

    output.progress(&format!(
        "Deploying {} artifact(s) to {}",
        builders.len(),
        endpoint
    ));

    let mut orchestrator = Orchestrator::new(
        ConnectionManager::new(connector),
        endpoint,
        credentials,
        config.deploy_settings(verbose),
    )
    .with_packager(Arc::new(config.packager()));

    if let Some(store) = config.rollback_store(base) {
        orchestrator = orchestrator.with_rollback_store(store);
    }

    let mut report = orchestrator.run(builders).await;

    // Resolution warnings come first, in the order they happened.
    let mut warnings = diag.into_warnings();
    warnings.append(&mut report.warnings);
    report.warnings = warnings;

    output.report(&report, verbose);
    Ok(report.status())
}
