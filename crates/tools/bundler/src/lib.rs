//! Bundler dependency manager for rackenv.

use async_trait::async_trait;
use rackenv_core::Result;
use rackenv_core::ownership::Ownership;
use rackenv_core::process::{CommandRunner, Invocation};
use rackenv_core::services::{DependencyInstallRequest, DependencyManager};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Dependency manager backed by the `bundle` CLI.
pub struct BundlerManager {
    runner: Arc<dyn CommandRunner>,
}

impl BundlerManager {
    /// Create a manager that runs commands through `runner`.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Build a `bundle <args>` invocation in `directory`.
    ///
    /// With an activation prefix the whole line runs through `sh -c` so the
    /// prefix can set up the runtime environment first.
    fn bundle_invocation(
        directory: &Path,
        ownership: &Ownership,
        activation_prefix: Option<&str>,
        args: Vec<String>,
    ) -> Invocation {
        let invocation = match activation_prefix {
            Some(prefix) => Invocation::shell(format!("{prefix} bundle {}", args.join(" "))),
            None => Invocation::new("bundle").args(args),
        };

        invocation
            .current_dir(directory)
            .ownership(ownership.clone())
    }

    /// Build the `bundle platform --ruby` invocation.
    #[must_use]
    pub fn platform_invocation(
        directory: &Path,
        ownership: &Ownership,
        activation_prefix: Option<&str>,
    ) -> Invocation {
        Self::bundle_invocation(
            directory,
            ownership,
            activation_prefix,
            vec!["platform".to_string(), "--ruby".to_string()],
        )
    }

    /// Build the `bundle install` invocation for a request.
    #[must_use]
    pub fn install_invocation(request: &DependencyInstallRequest<'_>) -> Invocation {
        let mut args = vec!["install".to_string()];
        if !request.excluded.is_empty() {
            args.push("--without".to_string());
            args.extend(request.excluded.iter().map(|p| p.name().to_string()));
        }

        Self::bundle_invocation(
            request.directory,
            request.ownership,
            request.activation_prefix,
            args,
        )
    }
}

#[async_trait]
impl DependencyManager for BundlerManager {
    fn name(&self) -> &'static str {
        "bundler"
    }

    async fn declared_runtime_version(
        &self,
        directory: &Path,
        ownership: &Ownership,
        activation_prefix: Option<&str>,
    ) -> Result<String> {
        let invocation = Self::platform_invocation(directory, ownership, activation_prefix);
        let output = self.runner.run(&invocation).await?.into_success(&invocation)?;

        let declared = output.stdout.lines().next().unwrap_or_default().trim().to_string();
        debug!(%declared, "bundle platform --ruby");
        Ok(declared)
    }

    async fn install(&self, request: &DependencyInstallRequest<'_>) -> Result<()> {
        let invocation = Self::install_invocation(request);
        info!(
            command = %invocation.command_line(),
            directory = %request.directory.display(),
            "Running bundle install"
        );

        self.runner.run(&invocation).await?.into_success(&invocation)?;
        Ok(())
    }
}
