use crate::commands::{Command, ConvergeOptions};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rackenv")]
#[command(
    about = "Converge a Ruby application checkout: OS packages, rbenv ruby, .ruby-version and bundle install"
)]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: crate::tracing::LogLevel,

    #[arg(long, global = true, help = "Output logs and reports in JSON format")]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Show version information")]
    Version,

    #[command(about = "Converge an application checkout")]
    Converge {
        #[arg(help = "Path to the application checkout")]
        directory: PathBuf,
        #[arg(
            long,
            short = 'c',
            help = "Configuration file (default: <DIRECTORY>/rackenv.toml)"
        )]
        config: Option<PathBuf>,
        #[arg(
            long,
            short = 'p',
            env = "RACK_ENV",
            help = "Active deployment profile"
        )]
        profile: Option<String>,
        #[arg(long, short = 'u', help = "Owner of created files and bundle install")]
        user: Option<String>,
        #[arg(long, short = 'g', help = "Group of created files and bundle install")]
        group: Option<String>,
        #[arg(long, help = "Per-command timeout in seconds")]
        timeout: Option<u64>,
        #[arg(long, help = "rbenv executable", default_value = "rbenv")]
        rbenv: String,
        #[arg(
            long,
            help = "Use the ruby version declared by the project instead of rbenv's current one"
        )]
        project_version: bool,
    },

    #[command(about = "Print the profiles excluded from bundle install for a profile")]
    ExcludedProfiles {
        #[arg(help = "Active deployment profile")]
        profile: String,
    },
}

impl From<Commands> for Command {
    fn from(cmd: Commands) -> Self {
        match cmd {
            Commands::Version => Command::Version,
            Commands::Converge {
                directory,
                config,
                profile,
                user,
                group,
                timeout,
                rbenv,
                project_version,
            } => Command::Converge(ConvergeOptions {
                directory,
                config,
                profile,
                user,
                group,
                timeout,
                rbenv,
                project_version,
            }),
            Commands::ExcludedProfiles { profile } => Command::ExcludedProfiles { profile },
        }
    }
}
