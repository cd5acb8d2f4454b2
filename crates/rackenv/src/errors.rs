//! CLI error types rendered through miette

use miette::Diagnostic;
use thiserror::Error;

/// CLI-specific error types with enhanced diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Anything the convergence library reports keeps its own diagnostic
    #[error(transparent)]
    #[diagnostic(transparent)]
    Converge(#[from] rackenv_core::Error),

    #[error("Invalid command line argument: {argument}")]
    #[diagnostic(
        code(rackenv::cli::invalid_argument),
        help("Run 'rackenv --help' to see available options")
    )]
    InvalidArgument { argument: String },

    #[error("Failed to render output as JSON")]
    #[diagnostic(code(rackenv::cli::output_error))]
    OutputError {
        #[source]
        source: serde_json::Error,
    },

    #[error("Tracing initialization failed ({config_used})")]
    #[diagnostic(
        code(rackenv::cli::tracing_error),
        help("Check RUST_LOG and the --level flag")
    )]
    TracingError {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        config_used: String,
    },
}

impl CliError {
    pub fn invalid_argument(argument: impl Into<String>) -> Self {
        CliError::InvalidArgument {
            argument: argument.into(),
        }
    }

    pub fn output(source: serde_json::Error) -> Self {
        CliError::OutputError { source }
    }

    pub fn tracing(
        source: impl std::error::Error + Send + Sync + 'static,
        config_used: impl Into<String>,
    ) -> Self {
        CliError::TracingError {
            source: Box::new(source),
            config_used: config_used.into(),
        }
    }
}
