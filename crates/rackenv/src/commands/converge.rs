//! `rackenv converge`: wire the real service adapters into a [`Converger`]

use crate::errors::CliError;
use rackenv_converge::runtime::VersionSource;
use rackenv_converge::{ConvergenceReport, Converger};
use rackenv_core::Error;
use rackenv_core::config::{CONFIG_FILE_NAME, ConvergeConfig, RuntimeVersionPolicy};
use rackenv_core::process::{CommandRunner, SystemRunner};
use rackenv_core::profile::join_profiles;
use rackenv_tools_apt::AptInstaller;
use rackenv_tools_bundler::BundlerManager;
use rackenv_tools_rbenv::RbenvManager;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Instrument, debug};

/// Everything `rackenv converge` accepts on the command line
#[derive(Debug, Clone)]
pub struct ConvergeOptions {
    pub directory: PathBuf,
    pub config: Option<PathBuf>,
    pub profile: Option<String>,
    pub user: Option<String>,
    pub group: Option<String>,
    pub timeout: Option<u64>,
    pub rbenv: String,
    pub project_version: bool,
}

impl ConvergeOptions {
    /// Load the configuration file and overlay command line flags.
    ///
    /// An explicit `--config` must exist; the default `rackenv.toml` in the
    /// checkout is optional.
    pub fn resolve_config(&self) -> rackenv_core::Result<ConvergeConfig> {
        let path = match &self.config {
            Some(path) if !path.is_file() => {
                return Err(Error::configuration(format!(
                    "configuration file '{}' does not exist",
                    path.display()
                )));
            }
            Some(path) => path.clone(),
            None => self.directory.join(CONFIG_FILE_NAME),
        };

        let mut config = ConvergeConfig::load_or_default(&path)?;
        if let Some(profile) = &self.profile {
            config.active_profile.clone_from(profile);
        }
        if self.user.is_some() {
            config.user.clone_from(&self.user);
        }
        if self.group.is_some() {
            config.group.clone_from(&self.group);
        }
        if self.timeout.is_some() {
            config.command_timeout_seconds = self.timeout;
        }
        if self.project_version {
            config.runtime_version = RuntimeVersionPolicy::Project;
        }

        config.validate()?;
        debug!(?config, "Resolved configuration");
        Ok(config)
    }
}

/// Run the convergence and render its report.
pub async fn execute(options: &ConvergeOptions, json: bool) -> Result<String, CliError> {
    let config = options.resolve_config()?;

    let runner: Arc<dyn CommandRunner> =
        Arc::new(SystemRunner::new().with_timeout_seconds(config.command_timeout_seconds));
    let apt = AptInstaller::new(Arc::clone(&runner));
    let rbenv = RbenvManager::new(Arc::clone(&runner)).with_binary(&options.rbenv);
    let bundler = BundlerManager::new(runner);

    let span = crate::command_span!("converge");
    let report = Converger::new(&config, &apt, &rbenv, &bundler)
        .converge(&options.directory)
        .instrument(span)
        .await?;

    if json {
        let mut rendered = serde_json::to_string_pretty(&report).map_err(CliError::output)?;
        rendered.push('\n');
        Ok(rendered)
    } else {
        Ok(render_summary(&report))
    }
}

fn source_label(source: VersionSource) -> &'static str {
    match source {
        VersionSource::Manager => "rbenv",
        VersionSource::Project => "Gemfile",
    }
}

/// Human-readable run report, one line per step.
pub fn render_summary(report: &ConvergenceReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Converged {} in {}ms (ruby {} from {})",
        report.directory.display(),
        report.duration_ms,
        report.runtime_version,
        source_label(report.version_source)
    );

    for outcome in &report.steps {
        let _ = write!(out, "  {:<22} {}", outcome.step.name(), outcome.status);
        if !outcome.details.is_empty() {
            let _ = write!(out, " ({})", outcome.details.join(", "));
        }
        out.push('\n');
    }

    if !report.excluded_profiles.is_empty() {
        let _ = writeln!(
            out,
            "  without: {}",
            join_profiles(&report.excluded_profiles)
        );
    }
    out
}
