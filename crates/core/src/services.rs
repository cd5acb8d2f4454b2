//! Service traits for the external managers a convergence run drives.
//!
//! Each trait is a seam: the adapter crates implement them over real
//! programs (`apt-get`, `rbenv`, `bundle`) and the convergence tests
//! implement them in memory.

use async_trait::async_trait;
use std::path::Path;

use crate::Result;
use crate::outcome::StepStatus;
use crate::ownership::Ownership;
use crate::profile::Profile;

/// Installs OS-level packages.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Short name used in logs (e.g., "apt")
    fn name(&self) -> &'static str;

    /// Install `package` unless it is already present.
    ///
    /// Returns [`StepStatus::Unchanged`] when nothing needed doing.
    ///
    /// # Errors
    ///
    /// Returns an error if the package manager fails.
    async fn ensure_installed(&self, package: &str) -> Result<StepStatus>;
}

/// Manages language runtime versions.
#[async_trait]
pub trait RuntimeManager: Send + Sync {
    /// Short name used in logs (e.g., "rbenv")
    fn name(&self) -> &'static str;

    /// The currently active/default version, as reported by the manager.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager cannot be queried.
    async fn current_version(&self) -> Result<String>;

    /// Whether `version` is already installed.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager cannot be queried.
    async fn is_installed(&self, version: &str) -> Result<bool>;

    /// Install `version`. Installing a present version must succeed.
    ///
    /// # Errors
    ///
    /// Returns an error if installation fails.
    async fn install(&self, version: &str) -> Result<()>;
}

/// Parameters for one dependency installation.
#[derive(Debug, Clone)]
pub struct DependencyInstallRequest<'a> {
    /// Application checkout
    pub directory: &'a Path,
    /// Profiles whose dependency groups are skipped
    pub excluded: &'a [Profile],
    /// Account to run the install as
    pub ownership: &'a Ownership,
    /// Shell prefix that activates the runtime environment
    pub activation_prefix: Option<&'a str>,
}

/// Installs application-level dependencies.
#[async_trait]
pub trait DependencyManager: Send + Sync {
    /// Short name used in logs (e.g., "bundler")
    fn name(&self) -> &'static str;

    /// The runtime version the project declares, as raw text.
    ///
    /// The query runs in `directory` under the same account and activation
    /// prefix as [`DependencyManager::install`].
    ///
    /// # Errors
    ///
    /// Returns an error if the manager cannot be queried.
    async fn declared_runtime_version(
        &self,
        directory: &Path,
        ownership: &Ownership,
        activation_prefix: Option<&str>,
    ) -> Result<String>;

    /// Install declared dependencies, skipping the excluded profiles.
    ///
    /// # Errors
    ///
    /// Returns an error if installation fails.
    async fn install(&self, request: &DependencyInstallRequest<'_>) -> Result<()>;
}
