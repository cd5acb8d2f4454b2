//! rbenv runtime manager for rackenv.
//!
//! Manages Ruby versions via the system's rbenv (with ruby-build):
//! - reports the active version (`rbenv version-name`)
//! - lists installed versions (`rbenv versions --bare`)
//! - installs versions (`rbenv install --skip-existing`)

use async_trait::async_trait;
use rackenv_core::process::{CommandRunner, Invocation};
use rackenv_core::services::RuntimeManager;
use rackenv_core::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Pseudo-version rbenv uses for the system ruby
const SYSTEM_VERSION: &str = "system";

/// Runtime manager backed by the `rbenv` CLI.
pub struct RbenvManager {
    runner: Arc<dyn CommandRunner>,
    binary: String,
}

impl RbenvManager {
    /// Create a manager using `rbenv` from PATH.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            binary: "rbenv".to_string(),
        }
    }

    /// Use a specific rbenv executable.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn rbenv(&self) -> Invocation {
        Invocation::new(&self.binary)
    }

    /// Every installed version, one per line of `rbenv versions --bare`.
    async fn installed_versions(&self) -> Result<Vec<String>> {
        let invocation = self.rbenv().args(["versions", "--bare"]);
        let output = self.runner.run(&invocation).await?.into_success(&invocation)?;

        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[async_trait]
impl RuntimeManager for RbenvManager {
    fn name(&self) -> &'static str {
        "rbenv"
    }

    async fn current_version(&self) -> Result<String> {
        let invocation = self.rbenv().arg("version-name");
        let output = self.runner.run(&invocation).await?.into_success(&invocation)?;

        let version = output.stdout.trim();
        if version.is_empty() {
            return Err(Error::runtime_query("rbenv version-name printed nothing"));
        }

        debug!(%version, "rbenv current version");
        Ok(version.to_string())
    }

    async fn is_installed(&self, version: &str) -> Result<bool> {
        if version == SYSTEM_VERSION {
            return Ok(true);
        }
        Ok(self.installed_versions().await?.iter().any(|v| v == version))
    }

    async fn install(&self, version: &str) -> Result<()> {
        info!(%version, "Installing ruby via rbenv");
        let invocation = self.rbenv().args(["install", "--skip-existing", version]);
        self.runner.run(&invocation).await?.into_success(&invocation)?;

        // Refresh shims so the new version's executables are on PATH
        let rehash = self.rbenv().arg("rehash");
        self.runner.run(&rehash).await?.into_success(&rehash)?;

        debug!(%version, "Ruby installed successfully");
        Ok(())
    }
}
