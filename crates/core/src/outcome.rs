//! Typed results of convergence steps

use serde::Serialize;
use std::fmt;

/// The convergence steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    /// Delete legacy runtime pin files
    RemoveStalePins,
    /// Install OS packages for dependencies found in the lockfile
    InstallPackages,
    /// Determine the runtime version to install
    ResolveRuntime,
    /// Install the resolved runtime version
    InstallRuntime,
    /// Record the resolved version in the pin file
    WritePin,
    /// Install application dependencies
    InstallDependencies,
}

impl Step {
    /// All steps in the order a run executes them
    pub const ORDER: [Self; 6] = [
        Self::RemoveStalePins,
        Self::InstallPackages,
        Self::ResolveRuntime,
        Self::InstallRuntime,
        Self::WritePin,
        Self::InstallDependencies,
    ];

    /// Stable identifier used in logs and reports
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RemoveStalePins => "remove-stale-pins",
            Self::InstallPackages => "install-packages",
            Self::ResolveRuntime => "resolve-runtime",
            Self::InstallRuntime => "install-runtime",
            Self::WritePin => "write-pin",
            Self::InstallDependencies => "install-dependencies",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a step did to the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// State already matched; nothing was done
    Unchanged,
    /// State diverged and was brought in line
    Changed,
    /// An action ran whose effect cannot be observed from here
    Executed,
}

impl StepStatus {
    /// Combine two statuses; any change wins over no change.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Changed, _) | (_, Self::Changed) => Self::Changed,
            (Self::Executed, _) | (_, Self::Executed) => Self::Executed,
            _ => Self::Unchanged,
        }
    }

    /// Whether the step touched anything
    #[must_use]
    pub fn is_changed(self) -> bool {
        matches!(self, Self::Changed)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unchanged => "unchanged",
            Self::Changed => "changed",
            Self::Executed => "executed",
        })
    }
}

/// Result of one completed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    /// Which step ran
    pub step: Step,
    /// What it did
    pub status: StepStatus,
    /// Human-readable detail, e.g. removed files or installed packages
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl StepOutcome {
    /// Create an outcome without details
    #[must_use]
    pub fn new(step: Step, status: StepStatus) -> Self {
        Self {
            step,
            status,
            details: Vec::new(),
        }
    }

    /// Attach details to the outcome
    #[must_use]
    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }
}
