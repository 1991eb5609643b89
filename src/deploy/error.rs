// ABOUTME: Error types for deployment operations.
// ABOUTME: One variant per failure class so callers can tell install, distribution and start apart.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::artifact::PackageError;
use crate::connection::ConnectionError;
use crate::remote::RemoteError;
use crate::types::AppName;

/// Step of an artifact deployment that was running when something failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Connect,
    Prepare,
    Stop,
    Uninstall,
    Install,
    Update,
    Distribution,
    Start,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Connect => "connect",
            Operation::Prepare => "prepare",
            Operation::Stop => "stop",
            Operation::Uninstall => "uninstall",
            Operation::Install => "install",
            Operation::Update => "update",
            Operation::Distribution => "distribution",
            Operation::Start => "start",
        };
        f.write_str(name)
    }
}

/// Failure to register for management notifications.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("application management object not found")]
    ManagementObjectNotFound,

    #[error("failed to look up application management object: {0}")]
    Lookup(#[source] RemoteError),

    #[error("failed to register notification listener: {0}")]
    Registration(#[source] RemoteError),
}

/// Errors that can occur while deploying one artifact.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    #[error("installation of {app} failed: {log}")]
    InstallationFailed { app: AppName, log: String },

    #[error("update of {app} failed: {log}")]
    UpdateFailed { app: AppName, log: String },

    #[error("uninstall of {app} failed: {log}")]
    UninstallFailed { app: AppName, log: String },

    #[error("deployment preferences for {app} were rejected: {}", .messages.join("; "))]
    ValidationFailed { app: AppName, messages: Vec<String> },

    #[error("{operation} of {app} did not finish within {}s", .timeout.as_secs())]
    OperationTimedOut {
        operation: Operation,
        app: AppName,
        timeout: Duration,
    },

    #[error("{app} was not distributed to every node within {}s", .timeout.as_secs())]
    DistributionIncomplete { app: AppName, timeout: Duration },

    #[error("malformed distribution status: {0}")]
    DistributionProtocol(String),

    #[error("{0} did not start on any target")]
    StartFailed(AppName),

    #[error("{operation} of {app} failed: {source}")]
    Remote {
        operation: Operation,
        app: AppName,
        #[source]
        source: RemoteError,
    },

    #[error("cannot read the application name from {path}: {source}")]
    NameDiscovery {
        path: PathBuf,
        #[source]
        source: RemoteError,
    },

    #[error(transparent)]
    Packaging(#[from] PackageError),

    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("rollback store error at {path}: {reason}")]
    RollbackStore { path: PathBuf, reason: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    Connection,
    ConnectionLost,
    Subscription,
    InstallationFailed,
    UpdateFailed,
    UninstallFailed,
    ValidationFailed,
    Timeout,
    DistributionIncomplete,
    DistributionProtocol,
    StartFailed,
    RemoteOperation,
    Packaging,
    InvalidArtifact,
    RollbackStore,
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::Connection(_) => DeployErrorKind::Connection,
            DeployError::Subscription(_) => DeployErrorKind::Subscription,
            DeployError::InstallationFailed { .. } => DeployErrorKind::InstallationFailed,
            DeployError::UpdateFailed { .. } => DeployErrorKind::UpdateFailed,
            DeployError::UninstallFailed { .. } => DeployErrorKind::UninstallFailed,
            DeployError::ValidationFailed { .. } => DeployErrorKind::ValidationFailed,
            DeployError::OperationTimedOut { .. } => DeployErrorKind::Timeout,
            DeployError::DistributionIncomplete { .. } => DeployErrorKind::DistributionIncomplete,
            DeployError::DistributionProtocol(_) => DeployErrorKind::DistributionProtocol,
            DeployError::StartFailed(_) => DeployErrorKind::StartFailed,
            DeployError::Remote { source, .. } if source.is_connection_loss() => {
                DeployErrorKind::ConnectionLost
            }
            DeployError::Remote { .. } => DeployErrorKind::RemoteOperation,
            DeployError::NameDiscovery { source, .. } if source.is_connection_loss() => {
                DeployErrorKind::ConnectionLost
            }
            DeployError::NameDiscovery { .. } => DeployErrorKind::RemoteOperation,
            DeployError::Packaging(_) => DeployErrorKind::Packaging,
            DeployError::InvalidArtifact(_) => DeployErrorKind::InvalidArtifact,
            DeployError::RollbackStore { .. } => DeployErrorKind::RollbackStore,
        }
    }

    /// The operation this error itself names, if any.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            DeployError::Remote { operation, .. }
            | DeployError::OperationTimedOut { operation, .. } => Some(*operation),
            DeployError::InstallationFailed { .. } => Some(Operation::Install),
            DeployError::UpdateFailed { .. } => Some(Operation::Update),
            DeployError::UninstallFailed { .. } => Some(Operation::Uninstall),
            DeployError::DistributionIncomplete { .. } | DeployError::DistributionProtocol(_) => {
                Some(Operation::Distribution)
            }
            DeployError::StartFailed(_) => Some(Operation::Start),
            _ => None,
        }
    }

    /// Classify a client error raised while issuing `operation`.
    pub fn remote(operation: Operation, app: &AppName, source: RemoteError) -> Self {
        match source {
            RemoteError::Validation(messages) => DeployError::ValidationFailed {
                app: app.clone(),
                messages,
            },
            source => DeployError::Remote {
                operation,
                app: app.clone(),
                source,
            },
        }
    }

    /// The failure reported through a task's `failed` notification.
    pub fn task_failed(operation: Operation, app: &AppName, log: String) -> Self {
        let app = app.clone();
        match operation {
            Operation::Update => DeployError::UpdateFailed { app, log },
            Operation::Uninstall => DeployError::UninstallFailed { app, log },
            _ => DeployError::InstallationFailed { app, log },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> AppName {
        AppName::new("shop").unwrap()
    }

    #[test]
    fn validation_errors_keep_every_message() {
        let err = DeployError::remote(
            Operation::Install,
            &app(),
            RemoteError::Validation(vec!["bad vhost".into(), "bad root".into()]),
        );
        assert_eq!(err.kind(), DeployErrorKind::ValidationFailed);
        let text = err.to_string();
        assert!(text.contains("bad vhost") && text.contains("bad root"));
    }

    #[test]
    fn lost_connection_is_its_own_kind() {
        let err = DeployError::remote(Operation::Start, &app(), RemoteError::NotConnected);
        assert_eq!(err.kind(), DeployErrorKind::ConnectionLost);

        let err = DeployError::remote(
            Operation::Start,
            &app(),
            RemoteError::Operation("boom".into()),
        );
        assert_eq!(err.kind(), DeployErrorKind::RemoteOperation);
    }

    #[test]
    fn task_failures_map_to_operation() {
        let log = "disk full".to_string();
        assert_eq!(
            DeployError::task_failed(Operation::Install, &app(), log.clone()).kind(),
            DeployErrorKind::InstallationFailed
        );
        assert_eq!(
            DeployError::task_failed(Operation::Update, &app(), log.clone()).kind(),
            DeployErrorKind::UpdateFailed
        );
        assert_eq!(
            DeployError::task_failed(Operation::Uninstall, &app(), log).kind(),
            DeployErrorKind::UninstallFailed
        );
    }

    #[test]
    fn errors_name_their_operation() {
        let err = DeployError::UninstallFailed {
            app: app(),
            log: String::new(),
        };
        assert_eq!(err.operation(), Some(Operation::Uninstall));
        let err = DeployError::remote(Operation::Stop, &app(), RemoteError::NotConnected);
        assert_eq!(err.operation(), Some(Operation::Stop));
        assert_eq!(DeployError::InvalidArtifact("x".into()).operation(), None);
    }

    #[test]
    fn timeout_message_names_operation_and_seconds() {
        let err = DeployError::OperationTimedOut {
            operation: Operation::Install,
            app: app(),
            timeout: Duration::from_secs(300),
        };
        assert_eq!(err.to_string(), "install of shop did not finish within 300s");
    }
}
