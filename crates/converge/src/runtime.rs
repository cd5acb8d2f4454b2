//! Runtime version resolution and installation

use rackenv_core::config::RuntimeVersionPolicy;
use rackenv_core::outcome::{Step, StepOutcome, StepStatus};
use rackenv_core::ownership::Ownership;
use rackenv_core::services::{DependencyManager, RuntimeManager};
use rackenv_core::{Error, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// What bundler reports when the Gemfile pins no ruby
pub const NO_DECLARED_VERSION: &str = "No ruby version specified";

/// Where a resolved version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionSource {
    /// The runtime manager's current version
    Manager,
    /// The project's declared version
    Project,
}

/// A runtime version ready to install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedVersion {
    /// Non-empty version identifier
    pub version: String,
    /// Where it came from
    pub source: VersionSource,
}

/// Turn a declared version like `ruby 2.7.1p83 (like)` into an identifier.
///
/// Parentheses are dropped and whitespace-separated tokens are joined with
/// `-`. Returns `None` for the no-version sentinel and for text that
/// normalizes to nothing.
#[must_use]
pub fn normalize_declared_version(declared: &str) -> Option<String> {
    let declared = declared.trim();
    if declared == NO_DECLARED_VERSION {
        return None;
    }

    let stripped: String = declared.chars().filter(|c| !matches!(c, '(' | ')')).collect();
    let normalized = stripped.split_whitespace().collect::<Vec<_>>().join("-");

    (!normalized.is_empty()).then_some(normalized)
}

/// Resolve the runtime version according to `policy`.
///
/// Resolution is single-shot: one query per source, no retries.
///
/// # Errors
///
/// Returns an error if a manager query fails or the runtime manager reports
/// an empty version.
pub async fn resolve_runtime_version(
    policy: RuntimeVersionPolicy,
    runtime: &dyn RuntimeManager,
    dependencies: &dyn DependencyManager,
    directory: &Path,
    ownership: &Ownership,
    activation_prefix: Option<&str>,
) -> Result<ResolvedVersion> {
    if policy == RuntimeVersionPolicy::Project {
        let declared = dependencies
            .declared_runtime_version(directory, ownership, activation_prefix)
            .await?;
        debug!(%declared, manager = dependencies.name(), "Project declared runtime version");

        if let Some(version) = normalize_declared_version(&declared) {
            return Ok(ResolvedVersion {
                version,
                source: VersionSource::Project,
            });
        }
        debug!("Project declares no runtime version, using the manager's current one");
    }

    let version = runtime.current_version().await?;
    if version.trim().is_empty() {
        return Err(Error::runtime_query(format!(
            "{} reported an empty current version",
            runtime.name()
        )));
    }

    Ok(ResolvedVersion {
        version,
        source: VersionSource::Manager,
    })
}

/// Install `version` unless the runtime manager already has it.
///
/// # Errors
///
/// Returns an error if the manager query or installation fails.
pub async fn install_runtime(runtime: &dyn RuntimeManager, version: &str) -> Result<StepOutcome> {
    if runtime.is_installed(version).await? {
        debug!(%version, manager = runtime.name(), "Runtime already installed");
        return Ok(StepOutcome::new(Step::InstallRuntime, StepStatus::Unchanged));
    }

    info!(%version, manager = runtime.name(), "Installing runtime");
    runtime.install(version).await?;

    Ok(StepOutcome::new(Step::InstallRuntime, StepStatus::Changed)
        .with_details(vec![version.to_string()]))
}
