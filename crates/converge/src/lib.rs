//! Convergence procedure for a Ruby application checkout
//!
//! A run takes a checkout from an unknown state to the configured one in six
//! ordered steps:
//!
//! 1. remove stale runtime pin files ([`pins::remove_stale_pins`])
//! 2. install OS packages for gems found in `Gemfile.lock`
//!    ([`lockfile`], [`packages`])
//! 3. resolve the runtime version ([`runtime::resolve_runtime_version`])
//! 4. install that runtime ([`runtime::install_runtime`])
//! 5. write `.ruby-version` ([`pins::write_pin`])
//! 6. `bundle install` without the inactive profiles ([`dependencies`])
//!
//! Every step is idempotent or overwrite-based. The run stops at the first
//! failure, and repeating the whole run after fixing the cause is always safe.

pub mod dependencies;
pub mod lockfile;
pub mod packages;
pub mod pins;
pub mod runtime;

use rackenv_core::config::ConvergeConfig;
use rackenv_core::outcome::{Step, StepOutcome, StepStatus};
use rackenv_core::profile::Profile;
use rackenv_core::services::{DependencyManager, PackageInstaller, RuntimeManager};
use rackenv_core::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument};

use crate::lockfile::Lockfile;
use crate::runtime::{ResolvedVersion, VersionSource};

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ConvergenceReport {
    /// The converged checkout
    pub directory: PathBuf,
    /// One outcome per step, in execution order
    pub steps: Vec<StepOutcome>,
    /// The runtime version installed and pinned
    pub runtime_version: String,
    /// Where the runtime version came from
    pub version_source: VersionSource,
    /// Profiles passed to `--without`
    pub excluded_profiles: Vec<Profile>,
    /// Wall time of the run
    pub duration_ms: u64,
}

impl ConvergenceReport {
    /// Whether any step changed the system
    #[must_use]
    pub fn changed(&self) -> bool {
        self.steps.iter().any(|s| s.status.is_changed())
    }

    /// The outcome recorded for `step`
    #[must_use]
    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == step)
    }
}

/// Drives the convergence steps against a set of service implementations.
pub struct Converger<'a> {
    config: &'a ConvergeConfig,
    packages: &'a dyn PackageInstaller,
    runtime: &'a dyn RuntimeManager,
    dependencies: &'a dyn DependencyManager,
}

impl<'a> Converger<'a> {
    /// Create a converger over the given configuration and services
    #[must_use]
    pub fn new(
        config: &'a ConvergeConfig,
        packages: &'a dyn PackageInstaller,
        runtime: &'a dyn RuntimeManager,
        dependencies: &'a dyn DependencyManager,
    ) -> Self {
        Self {
            config,
            packages,
            runtime,
            dependencies,
        }
    }

    /// Converge `directory` to the configured state.
    ///
    /// # Errors
    ///
    /// Returns a configuration error, before any step runs, when the
    /// directory is missing or the configured user or group does not exist.
    /// Otherwise returns [`Error::Step`] wrapping the first failure; later
    /// steps do not run.
    #[instrument(name = "converge", skip(self, directory), fields(directory = %directory.display()))]
    pub async fn converge(&self, directory: &Path) -> Result<ConvergenceReport> {
        let start = Instant::now();

        if !directory.is_dir() {
            return Err(Error::configuration(format!(
                "target directory '{}' does not exist",
                directory.display()
            )));
        }

        // Unknown accounts fail the run before anything is touched
        let ownership = self.config.ownership();
        ownership.resolve()?;

        let mut steps = Vec::with_capacity(Step::ORDER.len());
        let previous_pin = pins::read_pin(directory).await;

        begin(Step::RemoveStalePins);
        record(
            &mut steps,
            pins::remove_stale_pins(directory)
                .await
                .map_err(|e| Error::step(Step::RemoveStalePins, e))?,
        );

        begin(Step::InstallPackages);
        let lockfile = Lockfile::read(directory).await;
        let required = packages::required_packages(
            &self.config.gem_dependencies,
            &lockfile,
            self.config.scan_policy,
        );
        record(
            &mut steps,
            packages::install_packages(self.packages, &required)
                .await
                .map_err(|e| Error::step(Step::InstallPackages, e))?,
        );

        begin(Step::ResolveRuntime);
        let ResolvedVersion { version, source } = runtime::resolve_runtime_version(
            self.config.runtime_version,
            self.runtime,
            self.dependencies,
            directory,
            &ownership,
            self.config.activation_prefix.as_deref(),
        )
        .await
        .map_err(|e| Error::step(Step::ResolveRuntime, e))?;
        info!(%version, ?source, "Resolved runtime version");
        record(
            &mut steps,
            StepOutcome::new(Step::ResolveRuntime, StepStatus::Unchanged)
                .with_details(vec![version.clone()]),
        );

        begin(Step::InstallRuntime);
        record(
            &mut steps,
            runtime::install_runtime(self.runtime, &version)
                .await
                .map_err(|e| Error::step(Step::InstallRuntime, e))?,
        );

        begin(Step::WritePin);
        record(
            &mut steps,
            pins::write_pin(directory, &version, previous_pin.as_deref(), &ownership)
                .await
                .map_err(|e| Error::step(Step::WritePin, e))?,
        );

        begin(Step::InstallDependencies);
        let (outcome, excluded_profiles) = dependencies::install_dependencies(
            self.dependencies,
            directory,
            &self.config.active_profile,
            &ownership,
            self.config.activation_prefix.as_deref(),
        )
        .await
        .map_err(|e| Error::step(Step::InstallDependencies, e))?;
        record(&mut steps, outcome);

        let report = ConvergenceReport {
            directory: directory.to_path_buf(),
            steps,
            runtime_version: version,
            version_source: source,
            excluded_profiles,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            changed = report.changed(),
            duration_ms = report.duration_ms,
            "Convergence complete"
        );

        Ok(report)
    }
}

fn begin(step: Step) {
    info!(step = step.name(), "Starting step");
}

fn record(steps: &mut Vec<StepOutcome>, outcome: StepOutcome) {
    info!(
        step = outcome.step.name(),
        status = %outcome.status,
        "Step finished"
    );
    steps.push(outcome);
}
