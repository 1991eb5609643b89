// ABOUTME: Diagnostics accumulator for non-fatal warnings during a deployment run.
// ABOUTME: Collects warnings that shouldn't fail an artifact but should be shown to users.

use serde::Serialize;

/// Collects non-fatal warnings during deployment operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

/// A non-fatal warning collected during deployment.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a warning for attributes the server refused to apply.
    pub fn attribute_apply(message: impl Into<String>) -> Self {
        Self::new(WarningKind::AttributeApply, message)
    }

    /// Create a warning for a rollback copy that could not be saved.
    pub fn rollback_save(message: impl Into<String>) -> Self {
        Self::new(WarningKind::RollbackSave, message)
    }

    /// Create a warning for a rollback that did not restore the previous version.
    pub fn rollback_failed(message: impl Into<String>) -> Self {
        Self::new(WarningKind::RollbackFailed, message)
    }

    /// Create a warning for an artifact pattern matching more than one file.
    pub fn multiple_matches(message: impl Into<String>) -> Self {
        Self::new(WarningKind::MultipleMatches, message)
    }
}

/// Categories of warnings that can occur during deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    /// Post-install attribute update failed; the application is still started.
    AttributeApply,
    /// Saving the rollback copy of a deployed archive failed.
    RollbackSave,
    /// Restoring the previous archive after a failure did not succeed.
    RollbackFailed,
    /// A pattern with a pinned name or URI resolved to several files; only the first is kept.
    MultipleMatches,
}
