//! Escalation controller
//!
//! Keeps the cumulative divergence count for the lifetime of the process
//! and arms a delayed termination once it becomes non-zero. The counter is
//! never reset; one divergent pass is enough.

use crate::error::SourceError;
use sigwatch_model::DivergenceReport;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info};

/// Result of one comparison pass
#[derive(Debug, Clone)]
pub enum PassOutcome {
    /// Snapshot and shadow store agree
    Clean {
        /// Time spent fetching and comparing
        duration: Duration,
    },
    /// Findings were reported
    Diverged {
        /// The findings
        report: DivergenceReport,
        /// Time spent fetching and comparing
        duration: Duration,
    },
    /// The pass could not run to completion
    Failed {
        /// Why the snapshot could not be obtained
        error: SourceError,
        /// Time spent before failing
        duration: Duration,
    },
}

impl PassOutcome {
    /// Classify a finished comparison
    #[must_use]
    pub fn from_report(report: DivergenceReport, duration: Duration) -> Self {
        if report.is_empty() {
            Self::Clean { duration }
        } else {
            Self::Diverged { report, duration }
        }
    }

    /// Number of findings counted toward escalation
    #[must_use]
    pub fn error_count(&self) -> u64 {
        match self {
            Self::Diverged { report, .. } => report.len() as u64,
            Self::Clean { .. } | Self::Failed { .. } => 0,
        }
    }

    /// Pass duration
    #[must_use]
    pub fn duration(&self) -> Duration {
        match self {
            Self::Clean { duration }
            | Self::Diverged { duration, .. }
            | Self::Failed { duration, .. } => *duration,
        }
    }
}

/// Cumulative error counter and termination timer
#[derive(Debug)]
pub struct EscalationController {
    errors: u64,
    grace: Duration,
    deadline: Option<Instant>,
    passes: u64,
    failed_passes: u64,
}

impl EscalationController {
    /// Create a controller that waits `grace` between arming and firing
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        Self {
            errors: 0,
            grace,
            deadline: None,
            passes: 0,
            failed_passes: 0,
        }
    }

    /// Account for a finished pass
    ///
    /// Returns the termination deadline when this pass armed it. Later
    /// passes never move an armed deadline.
    pub fn record(&mut self, outcome: &PassOutcome, now: Instant) -> Option<Instant> {
        self.passes += 1;
        let duration = outcome.duration();

        match outcome {
            PassOutcome::Clean { .. } => {
                info!(
                    pass = self.passes,
                    duration_ms = duration.as_millis(),
                    "Validating objects exit: no differences found"
                );
            }
            PassOutcome::Diverged { report, .. } => {
                for finding in report {
                    error!("{finding}");
                }
                self.errors += outcome.error_count();
                error!(
                    pass = self.passes,
                    findings = report.len(),
                    total_errors = self.errors,
                    duration_ms = duration.as_millis(),
                    "Validating objects exit: shadow store diverged from snapshot"
                );
            }
            PassOutcome::Failed { error, .. } => {
                self.failed_passes += 1;
                error!(
                    pass = self.passes,
                    error = %error,
                    duration_ms = duration.as_millis(),
                    "Comparison pass aborted"
                );
            }
        }

        if self.errors > 0 && self.deadline.is_none() {
            let deadline = now + self.grace;
            self.deadline = Some(deadline);
            error!(
                grace_ms = self.grace.as_millis(),
                "Divergence confirmed, terminating producer after grace delay"
            );
            return Some(deadline);
        }
        None
    }

    /// Armed termination deadline
    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether termination is armed
    #[inline]
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Cumulative divergence count
    #[inline]
    #[must_use]
    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Passes recorded, including failed ones
    #[inline]
    #[must_use]
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Passes that could not complete
    #[inline]
    #[must_use]
    pub fn failed_passes(&self) -> u64 {
        self.failed_passes
    }
}
