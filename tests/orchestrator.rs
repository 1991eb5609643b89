// ABOUTME: End-to-end deployment runs against the simulated management server.
// ABOUTME: Covers install and update paths, per-artifact failures, rollback and run status.

mod support;

use appdeploy::artifact::{ArtifactBuilder, DeploymentOptions, OptionValue, keys};
use appdeploy::deploy::{
    ArtifactOutcome, DeployErrorKind, DeploySettings, Operation, OperationMode, RollbackOutcome,
    RollbackStore, RunStatus,
};
use appdeploy::diagnostics::WarningKind;
use appdeploy::remote::simulated::{Call, SimulatedServer, StartScript, TaskScript};
use appdeploy::types::AppName;
use std::time::Duration;
use support::{DEFAULT_TARGET, artifact, fast_settings, orchestrator, write_archive};

fn failure(outcome: &ArtifactOutcome) -> (Operation, DeployErrorKind, &RollbackOutcome) {
    match outcome {
        ArtifactOutcome::Failed {
            operation,
            error,
            rollback,
            ..
        } => (*operation, error.kind(), rollback),
        ArtifactOutcome::Deployed { app, .. } => panic!("{app} unexpectedly deployed"),
    }
}

#[tokio::test]
async fn fresh_install_deploys_and_starts() {
    support::init_tracing();
    let server = SimulatedServer::new();
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop-1.2.ear");
    server.set_archive_app_name("shop-1.2.ear", "shop");

    let report = orchestrator(&server, fast_settings())
        .run(vec![artifact(&ear)])
        .await;

    assert_eq!(report.status(), RunStatus::Success);
    assert!(report.warnings.is_empty());
    match &report.outcomes[0] {
        ArtifactOutcome::Deployed { app, targets, .. } => {
            assert_eq!(app.as_str(), "shop");
            assert_eq!(targets, &[DEFAULT_TARGET.to_string()]);
        }
        other => panic!("expected deployed, got {other:?}"),
    }
    assert!(server.is_running("shop"));
    assert!(!server.is_session_open());

    let calls = server.calls();
    assert_eq!(calls.first(), Some(&Call::Connect));
    assert!(calls.contains(&Call::ReadName("shop-1.2.ear".into())));
    assert!(calls.contains(&Call::Install("shop".into())));
    assert!(!calls.contains(&Call::Stop("shop".into())));
    assert_eq!(calls.last(), Some(&Call::Close));
    assert_eq!(server.listener_count(), 0);
}

#[tokio::test]
async fn install_options_carry_the_target_mapping() {
    let server = SimulatedServer::new();
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop.ear");

    let builder = artifact(&ear)
        .app_name(AppName::new("shop").unwrap())
        .context_root(Some("/store".into()))
        .precompile(true);
    let report = orchestrator(&server, fast_settings()).run(vec![builder]).await;
    assert_eq!(report.status(), RunStatus::Success);

    let options: DeploymentOptions = server.install_options("shop").unwrap();
    match options.get(keys::MODULE_TO_SERVER) {
        Some(OptionValue::Map(mapping)) => {
            assert_eq!(mapping.get(keys::ALL_MODULES).map(String::as_str), Some(DEFAULT_TARGET));
        }
        other => panic!("unexpected module mapping {other:?}"),
    }
    assert_eq!(options.get(keys::CONTEXT_ROOT), Some(&OptionValue::from("/store")));
    assert_eq!(options.get(keys::PRECOMPILE_JSP), Some(&OptionValue::from(true)));
    // Name discovery is skipped when the name is pinned.
    assert!(!server.calls().iter().any(|c| matches!(c, Call::ReadName(_))));
}

#[tokio::test]
async fn installed_app_is_stopped_then_redeployed_in_update_mode() {
    let server = SimulatedServer::new();
    server.preinstall("shop", &[DEFAULT_TARGET]);
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop.ear");

    let report = orchestrator(&server, fast_settings())
        .run(vec![artifact(&ear)])
        .await;

    assert_eq!(report.status(), RunStatus::Success);
    let calls = server.calls();
    let stop = calls.iter().position(|c| *c == Call::Stop("shop".into())).unwrap();
    let redeploy = calls
        .iter()
        .position(|c| *c == Call::Redeploy("shop".into()))
        .unwrap();
    let start = calls.iter().position(|c| *c == Call::Start("shop".into())).unwrap();
    assert!(stop < redeploy && redeploy < start);
    assert!(!calls.contains(&Call::Uninstall("shop".into())));
    assert!(server.is_running("shop"));
}

#[tokio::test]
async fn reinstall_mode_uninstalls_first() {
    let server = SimulatedServer::new();
    server.preinstall("shop", &[DEFAULT_TARGET]);
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop.ear");
    let settings = DeploySettings {
        mode: OperationMode::Reinstall,
        ..fast_settings()
    };

    let report = orchestrator(&server, settings).run(vec![artifact(&ear)]).await;

    assert_eq!(report.status(), RunStatus::Success);
    let calls = server.calls();
    assert!(calls.contains(&Call::Uninstall("shop".into())));
    assert!(calls.contains(&Call::Install("shop".into())));
    assert!(!calls.contains(&Call::Redeploy("shop".into())));
}

/// Deploy the same archive twice in `mode`; returns the calls made by each run.
async fn deploy_twice(mode: OperationMode) -> (Vec<Call>, Vec<Call>) {
    let server = SimulatedServer::new();
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop.ear");
    let settings = DeploySettings {
        mode,
        ..fast_settings()
    };

    let first = orchestrator(&server, settings.clone())
        .run(vec![artifact(&ear)])
        .await;
    assert_eq!(first.status(), RunStatus::Success);
    let first_calls = server.calls();
    server.clear_calls();

    let second = orchestrator(&server, settings).run(vec![artifact(&ear)]).await;
    assert_eq!(second.status(), RunStatus::Success);
    assert!(server.is_running("shop"));
    (first_calls, server.calls())
}

#[tokio::test]
async fn repeated_reinstall_never_redeploys() {
    let (first, second) = deploy_twice(OperationMode::Reinstall).await;

    assert!(first.contains(&Call::Install("shop".into())));
    assert!(!first.contains(&Call::Uninstall("shop".into())));

    let uninstall = second
        .iter()
        .position(|c| *c == Call::Uninstall("shop".into()))
        .unwrap();
    let install = second
        .iter()
        .position(|c| *c == Call::Install("shop".into()))
        .unwrap();
    assert!(uninstall < install);
    assert!(!first.contains(&Call::Redeploy("shop".into())));
    assert!(!second.contains(&Call::Redeploy("shop".into())));
}

#[tokio::test]
async fn repeated_update_redeploys_on_second_run() {
    let (first, second) = deploy_twice(OperationMode::Update).await;

    assert!(first.contains(&Call::Install("shop".into())));
    assert!(!first.contains(&Call::Redeploy("shop".into())));

    assert!(second.contains(&Call::Redeploy("shop".into())));
    assert!(!second.contains(&Call::Install("shop".into())));
    assert!(!second.contains(&Call::Uninstall("shop".into())));
}

#[tokio::test]
async fn failed_install_is_reported_with_its_log() {
    let server = SimulatedServer::new();
    server.script_install(TaskScript::Fail("ADMA0063E: could not install".into()));
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop.ear");

    let report = orchestrator(&server, fast_settings())
        .run(vec![artifact(&ear)])
        .await;

    assert_eq!(report.status(), RunStatus::Failure);
    let (operation, kind, rollback) = failure(&report.outcomes[0]);
    assert_eq!(operation, Operation::Install);
    assert_eq!(kind, DeployErrorKind::InstallationFailed);
    assert_eq!(rollback, &RollbackOutcome::NotAttempted);
    assert!(!server.installed_apps().contains(&"shop".to_string()));
}

#[tokio::test]
async fn rejected_preferences_keep_every_message() {
    let server = SimulatedServer::new();
    server.reject_with_validation(vec![
        "ADMA0080E: unknown virtual host".into(),
        "ADMA0081E: context root in use".into(),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop.ear");

    let report = orchestrator(&server, fast_settings())
        .run(vec![artifact(&ear)])
        .await;

    let (operation, kind, _) = failure(&report.outcomes[0]);
    assert_eq!(operation, Operation::Install);
    assert_eq!(kind, DeployErrorKind::ValidationFailed);
    let ArtifactOutcome::Failed { error, .. } = &report.outcomes[0] else {
        unreachable!()
    };
    let rendered = error.to_string();
    assert!(rendered.contains("ADMA0080E") && rendered.contains("ADMA0081E"));
}

#[tokio::test]
async fn silent_install_times_out() {
    let server = SimulatedServer::new();
    server.script_install(TaskScript::Silent);
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop.ear");
    let settings = DeploySettings {
        deployment_timeout: Duration::from_millis(200),
        ..fast_settings()
    };

    let report = orchestrator(&server, settings).run(vec![artifact(&ear)]).await;

    let (operation, kind, _) = failure(&report.outcomes[0]);
    assert_eq!(operation, Operation::Install);
    assert_eq!(kind, DeployErrorKind::Timeout);
    // The timed-out subscription was still removed.
    assert_eq!(server.listener_count(), 0);
}

#[tokio::test]
async fn duplicate_completion_is_harmless() {
    let server = SimulatedServer::new();
    server.script_install(TaskScript::CompleteTwice);
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop.ear");

    let report = orchestrator(&server, fast_settings())
        .run(vec![artifact(&ear)])
        .await;

    assert_eq!(report.status(), RunStatus::Success);
}

#[tokio::test]
async fn distribution_waits_for_unknown_nodes() {
    let server = SimulatedServer::new();
    server.script_distribution([
        "WebSphere:cell=cell01,node=node01,distribution=unknown",
        "WebSphere:cell=cell01,node=node01,distribution=false",
        "WebSphere:cell=cell01,node=node01,distribution=true",
    ]);
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop.ear");

    let report = orchestrator(&server, fast_settings())
        .run(vec![artifact(&ear)])
        .await;

    assert_eq!(report.status(), RunStatus::Success);
    let polls = server
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::DistributionStatus(_)))
        .count();
    assert_eq!(polls, 3);
}

#[tokio::test]
async fn distribution_that_never_finishes_fails_the_artifact() {
    let server = SimulatedServer::new();
    server.script_distribution(["WebSphere:cell=cell01,node=node01,distribution=false"]);
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop.ear");
    let settings = DeploySettings {
        deployment_timeout: Duration::from_millis(300),
        ..fast_settings()
    };

    let report = orchestrator(&server, settings).run(vec![artifact(&ear)]).await;

    let (operation, kind, _) = failure(&report.outcomes[0]);
    assert_eq!(operation, Operation::Distribution);
    assert_eq!(kind, DeployErrorKind::DistributionIncomplete);
    assert!(!server.calls().contains(&Call::Start("shop".into())));
}

#[tokio::test]
async fn unknown_distribution_until_hard_cap_never_starts() {
    let server = SimulatedServer::new();
    server.script_distribution(["WebSphere:cell=cell01,node=node01,distribution=unknown"]);
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop.ear");
    let settings = DeploySettings {
        deployment_timeout: Duration::from_secs(2),
        distribution: appdeploy::deploy::DistributionSettings {
            poll_interval: Duration::from_secs(1),
            cycle_timeout: Duration::from_secs(1),
        },
        ..fast_settings()
    };

    let started = std::time::Instant::now();
    let report = orchestrator(&server, settings).run(vec![artifact(&ear)]).await;

    let (operation, kind, _) = failure(&report.outcomes[0]);
    assert_eq!(operation, Operation::Distribution);
    assert_eq!(kind, DeployErrorKind::DistributionIncomplete);
    assert_eq!(report.status(), RunStatus::Failure);
    assert!(started.elapsed() >= Duration::from_secs(2));

    let calls = server.calls();
    let polls = calls
        .iter()
        .filter(|c| matches!(c, Call::DistributionStatus(_)))
        .count();
    assert!((2..=3).contains(&polls), "expected about two cycles, saw {polls}");
    assert!(!calls.contains(&Call::Start("shop".into())));
    assert_eq!(server.listener_count(), 0);
}

#[tokio::test]
async fn start_nowhere_fails_the_artifact() {
    let server = SimulatedServer::new();
    server.script_start(StartScript::Nowhere);
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop.ear");

    let report = orchestrator(&server, fast_settings())
        .run(vec![artifact(&ear)])
        .await;

    let (operation, kind, _) = failure(&report.outcomes[0]);
    assert_eq!(operation, Operation::Start);
    assert_eq!(kind, DeployErrorKind::StartFailed);
}

#[tokio::test]
async fn one_failure_does_not_stop_the_run() {
    let server = SimulatedServer::new();
    let dir = tempfile::tempdir().unwrap();
    let shop = write_archive(dir.path(), "shop.ear");
    let orders = write_archive(dir.path(), "orders.ear");

    // No target: rejected while preparing, before anything reaches the server.
    let untargeted = ArtifactBuilder::new(&orders);

    let report = orchestrator(&server, fast_settings())
        .run(vec![untargeted, artifact(&shop)])
        .await;

    assert_eq!(report.status(), RunStatus::Partial);
    assert_eq!(report.status().exit_code(), 2);
    assert_eq!(report.succeeded().count(), 1);
    let (operation, kind, _) = failure(&report.outcomes[0]);
    assert_eq!(operation, Operation::Prepare);
    assert_eq!(kind, DeployErrorKind::InvalidArtifact);
    assert_eq!(report.outcomes[1].label(), "shop");
    assert!(!server.calls().contains(&Call::Install("orders".into())));
}

#[tokio::test]
async fn unreachable_server_is_fatal() {
    let server = SimulatedServer::new();
    server.set_reachable(false);
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop.ear");

    let report = orchestrator(&server, fast_settings())
        .run(vec![artifact(&ear)])
        .await;

    assert_eq!(report.status(), RunStatus::Failure);
    assert!(report.outcomes.is_empty());
    assert_eq!(
        report.fatal.as_ref().map(|e| e.kind()),
        Some(DeployErrorKind::Connection)
    );
}

#[tokio::test]
async fn missing_management_object_fails_each_artifact() {
    let server = SimulatedServer::new();
    server.remove_app_management_object();
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop.ear");

    let report = orchestrator(&server, fast_settings())
        .run(vec![artifact(&ear)])
        .await;

    let (_, kind, _) = failure(&report.outcomes[0]);
    assert_eq!(kind, DeployErrorKind::Subscription);
}

#[tokio::test]
async fn war_is_wrapped_before_install() {
    let server = SimulatedServer::new();
    let dir = tempfile::tempdir().unwrap();
    let war = write_archive(dir.path(), "catalog.war");

    let report = orchestrator(&server, fast_settings())
        .run(vec![artifact(&war)])
        .await;

    assert_eq!(report.status(), RunStatus::Success);
    match &report.outcomes[0] {
        ArtifactOutcome::Deployed { app, archive, .. } => {
            assert_eq!(app.as_str(), "catalog");
            assert_eq!(archive, &dir.path().join("catalog.ear"));
            assert!(archive.exists());
        }
        other => panic!("expected deployed, got {other:?}"),
    }
    // Non-EAR names come from the file, not the server.
    assert!(!server.calls().iter().any(|c| matches!(c, Call::ReadName(_))));
}

#[tokio::test]
async fn rejected_attributes_warn_but_deploy() {
    let server = SimulatedServer::new();
    server.fail_attributes("ADMA0099E: bad weight");
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop.ear");

    let report = orchestrator(&server, fast_settings())
        .run(vec![artifact(&ear).startup_order(Some(10))])
        .await;

    assert_eq!(report.status(), RunStatus::Success);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].kind, WarningKind::AttributeApply);
    assert!(server.is_running("shop"));
}

#[tokio::test]
async fn successful_deploy_is_saved_and_restored_after_a_later_failure() {
    let server = SimulatedServer::new();
    let dir = tempfile::tempdir().unwrap();
    let store_dir = dir.path().join("rollback");
    let ear = write_archive(dir.path(), "shop.ear");

    let first = orchestrator(&server, fast_settings())
        .with_rollback_store(RollbackStore::new(&store_dir))
        .run(vec![artifact(&ear)])
        .await;
    assert_eq!(first.status(), RunStatus::Success);
    assert!(store_dir.join("shop.ear").exists());
    assert!(store_dir.join("shop.json").exists());

    // The next version never starts, and neither would the restored one.
    server.script_start(StartScript::Nowhere);
    let second = orchestrator(&server, fast_settings())
        .with_rollback_store(RollbackStore::new(&store_dir))
        .run(vec![artifact(&ear)])
        .await;

    let (operation, kind, rollback) = failure(&second.outcomes[0]);
    assert_eq!(operation, Operation::Start);
    assert_eq!(kind, DeployErrorKind::StartFailed);
    assert!(matches!(rollback, RollbackOutcome::Failed(_)));
    assert_eq!(second.warnings.len(), 1);
    assert_eq!(second.warnings[0].kind, WarningKind::RollbackFailed);
}

#[tokio::test]
async fn rollback_without_history_is_nothing_saved() {
    let server = SimulatedServer::new();
    server.script_install(TaskScript::Fail("boom".into()));
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop.ear");

    let report = orchestrator(&server, fast_settings())
        .with_rollback_store(RollbackStore::new(dir.path().join("rollback")))
        .run(vec![artifact(&ear)])
        .await;

    let (_, _, rollback) = failure(&report.outcomes[0]);
    assert_eq!(rollback, &RollbackOutcome::NothingSaved);
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn unwritable_rollback_store_only_warns() {
    let server = SimulatedServer::new();
    let dir = tempfile::tempdir().unwrap();
    let ear = write_archive(dir.path(), "shop.ear");
    // A plain file where the store directory should be.
    std::fs::write(dir.path().join("blocker"), b"").unwrap();

    let report = orchestrator(&server, fast_settings())
        .with_rollback_store(RollbackStore::new(dir.path().join("blocker/rollback")))
        .run(vec![artifact(&ear)])
        .await;

    assert_eq!(report.status(), RunStatus::Success);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].kind, WarningKind::RollbackSave);
}
