//! apt package installer for rackenv.
//!
//! Installs OS packages on Debian-family systems. Presence is checked with
//! `dpkg-query` first so already-installed packages never reach `apt-get`.

use async_trait::async_trait;
use rackenv_core::Result;
use rackenv_core::outcome::StepStatus;
use rackenv_core::process::{CommandRunner, Invocation};
use rackenv_core::services::PackageInstaller;
use std::sync::Arc;
use tracing::{debug, info};

/// `dpkg-query` status line of a fully installed package
const INSTALLED_STATUS: &str = "install ok installed";

/// Package installer backed by `dpkg-query` and `apt-get`.
pub struct AptInstaller {
    runner: Arc<dyn CommandRunner>,
}

impl AptInstaller {
    /// Create an installer that runs commands through `runner`.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Check whether `package` is fully installed.
    ///
    /// An unknown package makes `dpkg-query` exit non-zero, which simply
    /// means "not installed".
    async fn is_installed(&self, package: &str) -> Result<bool> {
        let output = self
            .runner
            .run(&Invocation::new("dpkg-query").args(["-W", "-f=${Status}", package]))
            .await?;

        let installed = output.success() && output.stdout.contains(INSTALLED_STATUS);
        debug!(%package, installed, "Queried package status");
        Ok(installed)
    }

    fn install_invocation(package: &str) -> Invocation {
        Invocation::new("apt-get")
            .args(["install", "-y", "--no-install-recommends", package])
            .env("DEBIAN_FRONTEND", "noninteractive")
    }
}

#[async_trait]
impl PackageInstaller for AptInstaller {
    fn name(&self) -> &'static str {
        "apt"
    }

    async fn ensure_installed(&self, package: &str) -> Result<StepStatus> {
        if self.is_installed(package).await? {
            return Ok(StepStatus::Unchanged);
        }

        info!(%package, "Installing package");
        let invocation = Self::install_invocation(package);
        self.runner.run(&invocation).await?.into_success(&invocation)?;

        Ok(StepStatus::Changed)
    }
}
