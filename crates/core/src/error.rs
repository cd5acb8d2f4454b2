//! Error types for rackenv operations

use crate::outcome::Step;
use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for rackenv operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    #[diagnostic(code(rackenv::config::invalid))]
    Configuration {
        /// The error message describing the configuration issue
        message: String,
    },

    /// I/O error with path context
    #[error("I/O error during {operation}: {source}")]
    #[diagnostic(code(rackenv::io::error))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// The path where the I/O error occurred, if applicable
        path: Option<Box<Path>>,
        /// Description of the operation that failed
        operation: String,
    },

    /// A command could not be started at all
    #[error("Failed to run `{command}`: {source}")]
    #[diagnostic(
        code(rackenv::process::spawn),
        help("Check that the program is installed and on PATH")
    )]
    Spawn {
        /// The command line that was attempted
        command: String,
        /// The underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// A command ran and exited unsuccessfully
    #[error("`{command}` exited with {}: {}", exit_label(*code), stderr.trim())]
    #[diagnostic(code(rackenv::process::failed))]
    CommandFailed {
        /// The command line that failed
        command: String,
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// A command exceeded its configured timeout
    #[error("`{command}` timed out after {seconds} seconds")]
    #[diagnostic(code(rackenv::process::timeout))]
    Timeout {
        /// The command line that timed out
        command: String,
        /// The timeout that was exceeded
        seconds: u64,
    },

    /// The runtime manager reported something unusable
    #[error("Runtime version query failed: {message}")]
    #[diagnostic(code(rackenv::runtime::query))]
    RuntimeQuery {
        /// What was wrong with the reported version
        message: String,
    },

    /// An OS package could not be installed
    #[error("Failed to install package '{package}'")]
    #[diagnostic(code(rackenv::package::install))]
    PackageInstall {
        /// The package identifier
        package: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// A convergence step failed; the run stops here
    #[error("Step '{step}' failed")]
    #[diagnostic(
        code(rackenv::converge::step),
        help("Every step is idempotent; fix the cause and re-run the whole convergence")
    )]
    Step {
        /// The step that failed
        step: Step,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },
}

fn exit_label(code: Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("status {c}"))
}

impl Error {
    /// Create a configuration error with a message
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an I/O error with context
    pub fn io(source: std::io::Error, path: Option<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.map(PathBuf::into_boxed_path),
            operation: operation.into(),
        }
    }

    /// Create a spawn error
    pub fn spawn(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            command: command.into(),
            source,
        }
    }

    /// Create a command failure error
    pub fn command_failed(
        command: impl Into<String>,
        code: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            code,
            stderr: stderr.into(),
        }
    }

    /// Create a runtime query error
    pub fn runtime_query(message: impl Into<String>) -> Self {
        Self::RuntimeQuery {
            message: message.into(),
        }
    }

    /// Wrap a failure with the package that caused it
    #[must_use]
    pub fn package_install(package: impl Into<String>, source: Self) -> Self {
        Self::PackageInstall {
            package: package.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a failure with the step it aborted
    #[must_use]
    pub fn step(step: Step, source: Self) -> Self {
        Self::Step {
            step,
            source: Box::new(source),
        }
    }

    /// The innermost command failure, if this error originates from one
    #[must_use]
    pub fn failed_command(&self) -> Option<(&str, Option<i32>)> {
        match self {
            Self::CommandFailed { command, code, .. } => Some((command, *code)),
            Self::PackageInstall { source, .. } | Self::Step { source, .. } => {
                source.failed_command()
            }
            _ => None,
        }
    }
}

/// Result type for rackenv operations
pub type Result<T> = std::result::Result<T, Error>;
