// ABOUTME: Tests for deployment state types and type state pattern.
// ABOUTME: Verifies state markers, Deployment<S> construction and failure bookkeeping.

use appdeploy::artifact::Artifact;
use appdeploy::deploy::{
    ArtifactOutcome, Configured, Connected, DeployError, DeploySettings, Deployment, Distributed,
    Operation, RollbackOutcome, Started, Stopped,
};
use appdeploy::types::{AppName, DeployTarget};
use std::mem::size_of;

fn artifact() -> Artifact {
    Artifact::builder("/srv/build/shop.ear")
        .app_name(AppName::new("shop").unwrap())
        .target(DeployTarget::parse("WebSphere:cell=cell01,cluster=web").unwrap())
        .build()
        .unwrap()
}

// =============================================================================
// State Marker Type Tests
// =============================================================================

/// Test: Steps that produce nothing are zero-sized markers.
#[test]
fn dataless_state_markers_are_zero_sized() {
    assert_eq!(size_of::<Connected>(), 0, "Connected should be zero-sized");
    assert_eq!(size_of::<Configured>(), 0, "Configured should be zero-sized");
    assert_eq!(size_of::<Distributed>(), 0, "Distributed should be zero-sized");
}

/// Test: Steps that learn something carry it in their state.
#[test]
fn data_state_markers_hold_data() {
    assert!(size_of::<Stopped>() > 0, "Stopped should remember prior install");
    assert!(size_of::<Started>() > 0, "Started should hold started targets");
}

/// Test: State markers implement Debug for diagnostics.
#[test]
fn state_markers_implement_debug() {
    let _ = format!("{:?}", Connected);
    let _ = format!("{:?}", Configured);
    let _ = format!("{:?}", Distributed);
}

// =============================================================================
// Deployment<S> Struct Tests
// =============================================================================

/// Test: Moving between dataless states does not change the deployment size.
#[test]
fn dataless_deployment_sizes_match() {
    assert_eq!(
        size_of::<Deployment<Connected>>(),
        size_of::<Deployment<Distributed>>()
    );
}

/// Test: Deployment implements Debug.
#[test]
fn deployment_implements_debug() {
    let deployment: Deployment<Connected> = Deployment::new(artifact(), DeploySettings::default());

    let debug_str = format!("{:?}", deployment);
    assert!(debug_str.contains("Deployment"));
    assert!(debug_str.contains("shop"));
}

// =============================================================================
// Constructor and Accessor Tests
// =============================================================================

/// Test: Deployment<Connected> exposes its artifact and settings.
#[test]
fn can_create_connected_deployment() {
    let deployment = Deployment::new(artifact(), DeploySettings::default());

    assert_eq!(deployment.app_name().as_str(), "shop");
    assert_eq!(
        deployment.artifact().target().as_str(),
        "WebSphere:cell=cell01,cluster=web"
    );
    assert!(!deployment.settings().verbose);
}

/// Test: A failure keeps the error and starts without a rollback attempt.
#[test]
fn failed_deployment_becomes_failed_outcome() {
    let failed = Deployment::new(artifact(), DeploySettings::default()).fail(
        Operation::Start,
        DeployError::StartFailed(AppName::new("shop").unwrap()),
    );
    assert_eq!(failed.rollback_outcome(), &RollbackOutcome::NotAttempted);

    match failed.into_outcome() {
        ArtifactOutcome::Failed {
            label,
            operation,
            rollback,
            ..
        } => {
            assert_eq!(label, "shop");
            assert_eq!(operation, Operation::Start);
            assert_eq!(rollback, RollbackOutcome::NotAttempted);
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

/// Test: Rolling back is a distinct state that still knows the artifact.
#[test]
fn begin_rollback_keeps_artifact() {
    let rolling = Deployment::new(artifact(), DeploySettings::default())
        .fail(Operation::Install, DeployError::InvalidArtifact("bad".into()))
        .begin_rollback();

    assert_eq!(rolling.app_name().as_str(), "shop");
}
