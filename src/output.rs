// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::deploy::{ArtifactOutcome, OutcomeSummary, RollbackOutcome, RunReport, RunStatus};
use crate::diagnostics::Warning;
use crate::targets::IndexedTarget;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => emit_json(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => emit_json(&JsonEvent {
                event: "warning",
                message,
                duration_secs: None,
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print the end-of-run summary: successes, failures, warnings, then status.
    pub fn report(&self, report: &RunReport, verbose: bool) {
        if self.mode == OutputMode::Json {
            let summaries: Vec<OutcomeSummary<'_>> =
                report.outcomes.iter().map(|o| o.summary(verbose)).collect();
            emit_json(&JsonReport {
                event: "report",
                status: report.status(),
                artifacts: summaries,
                warnings: &report.warnings,
                fatal: report
                    .fatal
                    .as_ref()
                    .map(|e| crate::deploy::render_error(e, verbose)),
                duration_secs: self.duration(),
            });
            return;
        }

        for warning in &report.warnings {
            self.warning(&warning.message);
        }

        if let Some(fatal) = &report.fatal {
            self.error(&crate::deploy::render_error(fatal, verbose));
        }

        if self.mode == OutputMode::Normal {
            print_section("Installed successfully", report.succeeded(), verbose);
            print_section("Installed failure", report.failed(), verbose);
        } else {
            for outcome in report.failed() {
                eprintln!("Failed: {}", outcome_line(outcome, verbose));
            }
        }

        let headline = match report.status() {
            RunStatus::Success => "Deployment complete",
            RunStatus::Partial => "Deployment partially complete",
            RunStatus::Failure => "Deployment failed",
        };
        self.success(&format!(
            "{headline}: {} deployed, {} failed",
            report.succeeded().count(),
            report.failed().count()
        ));
    }

    /// Print the deployable servers.
    pub fn servers(&self, servers: &[IndexedTarget]) {
        match self.mode {
            OutputMode::Json => {
                for server in servers {
                    emit_json(server);
                }
            }
            OutputMode::Normal | OutputMode::Quiet => {
                for entry in servers {
                    let server = &entry.server;
                    let details: Vec<&str> = [server.vendor.as_deref(), server.version.as_deref()]
                        .into_iter()
                        .flatten()
                        .collect();
                    if details.is_empty() || self.mode == OutputMode::Quiet {
                        println!("{:>3}. {}", entry.index, server.target);
                    } else {
                        println!("{:>3}. {} ({})", entry.index, server.target, details.join(" "));
                    }
                }
            }
        }
    }
}

fn print_section<'a>(
    title: &str,
    outcomes: impl Iterator<Item = &'a ArtifactOutcome>,
    verbose: bool,
) {
    let lines: Vec<String> = outcomes.map(|o| outcome_line(o, verbose)).collect();
    if lines.is_empty() {
        return;
    }
    println!("{title}:");
    for line in lines {
        println!("  - {line}");
    }
}

fn outcome_line(outcome: &ArtifactOutcome, verbose: bool) -> String {
    match outcome {
        ArtifactOutcome::Deployed { app, targets, .. } => {
            format!("{app} on {}", targets.join(", "))
        }
        ArtifactOutcome::Failed {
            label,
            operation,
            error,
            rollback,
        } => {
            let mut line = format!(
                "{label} ({operation}): {}",
                crate::deploy::render_error(error, verbose)
            );
            match rollback {
                RollbackOutcome::NotAttempted => {}
                RollbackOutcome::NothingSaved => line.push_str(" [no earlier version to restore]"),
                RollbackOutcome::Restored => line.push_str(" [previous version restored]"),
                RollbackOutcome::Failed(reason) => {
                    line.push_str(&format!(" [rollback failed: {reason}]"))
                }
            }
            line
        }
    }
}

fn emit_json<T: Serialize>(value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    event: &'a str,
    status: RunStatus,
    artifacts: Vec<OutcomeSummary<'a>>,
    #[serde(skip_serializing_if = "<[Warning]>::is_empty")]
    warnings: &'a [Warning],
    #[serde(skip_serializing_if = "Option::is_none")]
    fatal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
