mod cli;
mod commands;
mod errors;
mod tracing;

use crate::cli::Cli;
use crate::commands::Command;
use crate::errors::CliError;
use crate::tracing::{TracingConfig, TracingFormat};
use clap::Parser;

// Steps run strictly one after another, so a single-threaded runtime is enough
#[allow(clippy::print_stderr)]
#[tokio::main(flavor = "current_thread")]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    if let Err(error) = run().await {
        eprintln!("{:?}", miette::Report::new(error));
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    crate::tracing::init_tracing(TracingConfig {
        format: if cli.json {
            TracingFormat::Json
        } else {
            TracingFormat::Compact
        },
        level: cli.level.into(),
        ..Default::default()
    })?;

    let command: Command = cli.command.into();
    commands::execute(command, cli.json).await
}
