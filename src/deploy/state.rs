// ABOUTME: Deployment state marker types for the type state pattern.
// ABOUTME: State types carry the data each step produced so later steps can rely on it.

use super::error::{DeployError, Operation};
use super::rollback::RollbackOutcome;
use super::strategy::InstallPlan;

/// Initial state: session open, artifact prepared as an EAR with a name and target.
/// Available actions: `stop_existing()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Connected;

/// Any running copy of the application has been stopped.
/// Available actions: `install_or_update()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Stopped {
    pub(crate) was_installed: bool,
}

/// The install, reinstall or redeploy task reported completion.
/// Available actions: `apply_attributes()`
#[derive(Debug, Clone, Copy)]
pub struct Installed {
    pub(crate) plan: InstallPlan,
}

/// Post-install attributes applied (or skipped with a warning).
/// Available actions: `wait_for_distribution()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Configured;

/// Binaries reached every node.
/// Available actions: `start()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Distributed;

/// Application started on at least one target.
/// Available actions: `finish()`
#[derive(Debug, Clone, Default)]
pub struct Started {
    pub(crate) targets: Vec<String>,
}

/// A step failed. Terminal for the artifact, except that a rollback may be attempted.
/// Available actions: `begin_rollback()`, `into_outcome()`
#[derive(Debug)]
pub struct Failed {
    pub(crate) operation: Operation,
    pub(crate) error: DeployError,
    pub(crate) rollback: RollbackOutcome,
}

/// Restoring the last successfully deployed archive. Always ends back in `Failed`.
/// Available actions: `run()`
#[derive(Debug)]
pub struct RollingBack {
    pub(crate) failed: Failed,
}
