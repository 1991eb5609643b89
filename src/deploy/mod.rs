// ABOUTME: Application deployment orchestration using the type state pattern.
// ABOUTME: Exports state markers, the Deployment struct, and the run orchestrator.

mod deployment;
mod distribution;
mod error;
mod orchestrator;
mod report;
mod rollback;
mod state;
mod strategy;
mod subscription;
mod transitions;

pub use deployment::{DEFAULT_DEPLOYMENT_TIMEOUT, DeploySettings, Deployment};
pub use distribution::{
    DistributionPoller, DistributionSettings, DistributionStatus, NodeFlag, aggregate,
    parse_composite,
};
pub use error::{DeployError, DeployErrorKind, Operation, SubscriptionError};
pub use orchestrator::Orchestrator;
pub use report::{
    ArtifactOutcome, OutcomeSummary, RunReport, RunStatus, render_error,
};
pub use rollback::{RollbackOutcome, RollbackStore, SavedPackage};
pub use state::{
    Configured, Connected, Distributed, Failed, Installed, RollingBack, Started, Stopped,
};
pub use strategy::{InstallPlan, OperationMode};
pub use subscription::{NotificationSubscription, TerminalOutcome};
pub use transitions::TransitionResult;
