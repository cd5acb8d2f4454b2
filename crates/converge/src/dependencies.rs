//! Application dependency installation

use rackenv_core::Result;
use rackenv_core::outcome::{Step, StepOutcome, StepStatus};
use rackenv_core::ownership::Ownership;
use rackenv_core::profile::{Profile, excluded_profiles, join_profiles};
use rackenv_core::services::{DependencyInstallRequest, DependencyManager};
use std::path::Path;
use tracing::info;

/// Install dependencies in `directory` for `active_profile`.
///
/// Every known profile other than the active one is excluded. The install
/// always runs, so a successful run reports [`StepStatus::Executed`].
///
/// # Errors
///
/// Returns an error if the dependency manager fails.
pub async fn install_dependencies(
    dependencies: &dyn DependencyManager,
    directory: &Path,
    active_profile: &str,
    ownership: &Ownership,
    activation_prefix: Option<&str>,
) -> Result<(StepOutcome, Vec<Profile>)> {
    let excluded = excluded_profiles(active_profile);
    info!(
        manager = dependencies.name(),
        %active_profile,
        without = %join_profiles(&excluded),
        "Installing application dependencies"
    );

    dependencies
        .install(&DependencyInstallRequest {
            directory,
            excluded: &excluded,
            ownership,
            activation_prefix,
        })
        .await?;

    let outcome = StepOutcome::new(Step::InstallDependencies, StepStatus::Executed)
        .with_details(excluded.iter().map(|p| format!("without {p}")).collect());

    Ok((outcome, excluded))
}
