//! Configuration for a convergence run
//!
//! Loaded from `rackenv.toml`; every field has a default so an absent file
//! is a valid, empty configuration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::ownership::Ownership;
use crate::{Error, Result};

/// Default configuration file name, looked up in the target directory
pub const CONFIG_FILE_NAME: &str = "rackenv.toml";

/// Gem name to the OS packages it needs, in declaration order
pub type DependencyPackageMap = IndexMap<String, Vec<String>>;

/// Profile assumed when none is configured
pub const DEFAULT_PROFILE: &str = "production";

/// Where the runtime version comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeVersionPolicy {
    /// Use the runtime manager's current version verbatim
    #[default]
    Manager,
    /// Use the version the project declares, falling back to `Manager`
    /// when it declares none
    Project,
}

/// How lockfile matches gate OS package installation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanPolicy {
    /// Install a dependency's packages only when its name appears in the lockfile
    #[default]
    Lockfile,
    /// Install every mapped package regardless of the lockfile
    AssumePresent,
}

/// Everything a convergence run needs besides the target directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvergeConfig {
    /// Environment whose dependency group is installed
    pub active_profile: String,
    /// Owner of created files and account running commands
    pub user: Option<String>,
    /// Group of created files and commands
    pub group: Option<String>,
    /// Shell prefix that activates the installed runtime for bundler
    pub activation_prefix: Option<String>,
    /// Per-command timeout; no limit when absent
    pub command_timeout_seconds: Option<u64>,
    /// Runtime version source
    pub runtime_version: RuntimeVersionPolicy,
    /// Lockfile gating for OS packages
    pub scan_policy: ScanPolicy,
    /// Gem name to the OS packages it needs, in declaration order
    pub gem_dependencies: DependencyPackageMap,
}

impl Default for ConvergeConfig {
    fn default() -> Self {
        Self {
            active_profile: DEFAULT_PROFILE.to_string(),
            user: None,
            group: None,
            activation_prefix: None,
            command_timeout_seconds: None,
            runtime_version: RuntimeVersionPolicy::default(),
            scan_policy: ScanPolicy::default(),
            gem_dependencies: DependencyPackageMap::new(),
        }
    }
}

impl ConvergeConfig {
    /// Parse and validate configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed TOML, unknown keys or
    /// invalid values.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| Error::configuration(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, or defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(source) => {
                debug!(path = %path.display(), "Loading configuration");
                Self::from_toml_str(&source).map_err(|e| match e {
                    Error::Configuration { message } => {
                        Error::configuration(format!("{}: {message}", path.display()))
                    }
                    other => other,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(Error::io(
                e,
                Some(path.to_path_buf()),
                "reading configuration",
            )),
        }
    }

    /// Reject values that would only fail later, mid-run.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_seconds == Some(0) {
            return Err(Error::configuration(
                "command_timeout_seconds must be greater than zero",
            ));
        }

        if let Some(prefix) = &self.activation_prefix
            && prefix.trim().is_empty()
        {
            return Err(Error::configuration("activation_prefix must not be blank"));
        }

        for (gem, packages) in &self.gem_dependencies {
            if gem.trim().is_empty() {
                return Err(Error::configuration("gem_dependencies has an empty gem name"));
            }
            if let Some(blank) = packages.iter().find(|p| p.trim().is_empty()) {
                return Err(Error::configuration(format!(
                    "gem_dependencies.{gem} contains an invalid package name '{blank}'"
                )));
            }
        }

        Ok(())
    }

    /// Owner/group for created files and spawned commands
    #[must_use]
    pub fn ownership(&self) -> Ownership {
        Ownership::new(self.user.clone(), self.group.clone())
    }
}
