//! OS packages required by gems found in the lockfile

use rackenv_core::config::{DependencyPackageMap, ScanPolicy};
use rackenv_core::outcome::{Step, StepOutcome, StepStatus};
use rackenv_core::services::PackageInstaller;
use rackenv_core::{Error, Result};
use tracing::{debug, info};

use crate::lockfile::Lockfile;

/// Packages to install, in order: each matching gem's list in map order.
///
/// A package listed under several matching gems appears once, at its first
/// position.
#[must_use]
pub fn required_packages(
    gem_dependencies: &DependencyPackageMap,
    lockfile: &Lockfile,
    policy: ScanPolicy,
) -> Vec<String> {
    let mut packages: Vec<String> = Vec::new();

    for (gem, gem_packages) in gem_dependencies {
        let present = match policy {
            ScanPolicy::Lockfile => lockfile.contains(gem),
            ScanPolicy::AssumePresent => true,
        };
        debug!(%gem, present, "Scanned lockfile for gem");

        if present {
            for package in gem_packages {
                if !packages.contains(package) {
                    packages.push(package.clone());
                }
            }
        }
    }

    packages
}

/// Ensure every package is installed, in order, stopping at the first failure.
///
/// # Errors
///
/// Returns [`Error::PackageInstall`] naming the package that failed.
pub async fn install_packages(
    installer: &dyn PackageInstaller,
    packages: &[String],
) -> Result<StepOutcome> {
    let mut status = StepStatus::Unchanged;
    let mut installed = Vec::new();

    for package in packages {
        let package_status = installer
            .ensure_installed(package)
            .await
            .map_err(|e| Error::package_install(package, e))?;

        if package_status.is_changed() {
            info!(%package, installer = installer.name(), "Installed package");
            installed.push(package.clone());
        }
        status = status.merge(package_status);
    }

    Ok(StepOutcome::new(Step::InstallPackages, status).with_details(installed))
}
