// ABOUTME: Per-artifact outcomes and the run-level report built from them.
// ABOUTME: Decides the overall run status and renders errors for humans and JSON.

use std::error::Error as StdError;
use std::path::PathBuf;

use serde::Serialize;

use crate::diagnostics::Warning;
use crate::types::AppName;

use super::error::{DeployError, Operation};
use super::rollback::RollbackOutcome;

/// What happened to one artifact.
#[derive(Debug)]
pub enum ArtifactOutcome {
    Deployed {
        app: AppName,
        archive: PathBuf,
        targets: Vec<String>,
    },
    Failed {
        /// Application name when known, otherwise the artifact path.
        label: String,
        operation: Operation,
        error: DeployError,
        rollback: RollbackOutcome,
    },
}

impl ArtifactOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ArtifactOutcome::Deployed { .. })
    }

    pub fn label(&self) -> &str {
        match self {
            ArtifactOutcome::Deployed { app, .. } => app.as_str(),
            ArtifactOutcome::Failed { label, .. } => label,
        }
    }

    /// JSON-friendly view of this outcome.
    pub fn summary(&self, verbose: bool) -> OutcomeSummary<'_> {
        match self {
            ArtifactOutcome::Deployed { app, targets, .. } => OutcomeSummary {
                app: app.as_str(),
                status: "deployed",
                targets: targets.as_slice(),
                operation: None,
                error: None,
                rollback: None,
            },
            ArtifactOutcome::Failed {
                label,
                operation,
                error,
                rollback,
            } => OutcomeSummary {
                app: label,
                status: "failed",
                targets: &[],
                operation: Some(*operation),
                error: Some(render_error(error, verbose)),
                rollback: Some(rollback),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OutcomeSummary<'a> {
    pub app: &'a str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub targets: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback: Option<&'a RollbackOutcome>,
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
    Failure,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failure => 1,
            RunStatus::Partial => 2,
        }
    }
}

/// Everything a run produced: one outcome per artifact plus collected warnings.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<ArtifactOutcome>,
    pub warnings: Vec<Warning>,
    /// Set when the run stopped before any artifact was attempted.
    pub fatal: Option<DeployError>,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        if self.fatal.is_some() {
            return RunStatus::Failure;
        }
        let succeeded = self.succeeded().count();
        if succeeded == 0 {
            RunStatus::Failure
        } else if succeeded == self.outcomes.len() {
            RunStatus::Success
        } else {
            RunStatus::Partial
        }
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &ArtifactOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ArtifactOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// One-line error text, or the full cause chain when `verbose`.
pub fn render_error(error: &(dyn StdError + 'static), verbose: bool) -> String {
    let mut rendered = error.to_string();
    if verbose {
        let mut source = error.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            // Transparent wrappers repeat their inner message.
            if !rendered.ends_with(&text) {
                rendered.push_str("\n  caused by: ");
                rendered.push_str(&text);
            }
            source = cause.source();
        }
    }
    rendered
}
