pub mod converge;
pub mod profiles;
pub mod version;

pub use converge::ConvergeOptions;

use crate::errors::CliError;
use tracing::instrument;

#[derive(Debug, Clone)]
pub enum Command {
    Version,
    Converge(ConvergeOptions),
    ExcludedProfiles { profile: String },
}

impl Command {
    /// Name used for the command span
    pub fn name(&self) -> &'static str {
        match self {
            Command::Version => "version",
            Command::Converge(_) => "converge",
            Command::ExcludedProfiles { .. } => "excluded-profiles",
        }
    }
}

/// Run a command, printing its output to stdout.
#[allow(clippy::print_stdout)]
#[instrument(skip_all, fields(command = command.name()))]
pub async fn execute(command: Command, json: bool) -> Result<(), CliError> {
    match command {
        Command::Version => {
            println!("{}", version::get_version_info());
            Ok(())
        }
        Command::Converge(options) => {
            let output = converge::execute(&options, json).await?;
            print!("{output}");
            Ok(())
        }
        Command::ExcludedProfiles { profile } => {
            println!("{}", profiles::render(&profile, json)?);
            Ok(())
        }
    }
}
