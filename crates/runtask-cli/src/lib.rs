//! runtask CLI library

pub mod commands;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand, ValueEnum};

use runtask_common::telemetry::{LogFormat, TelemetryConfig, DEFAULT_FILTER};

/// runtask - Step Functions ECS RunTask states from YAML
#[derive(Parser, Debug)]
#[command(name = "runtask")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a task file and print the resolved task state as JSON
    Render(commands::render::RenderArgs),
    /// Build a task file without resolving it and print a summary
    Validate(commands::validate::ValidateArgs),
    /// Print the JSON schema of task files
    Schema,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl Cli {
    /// Telemetry settings selected on the command line
    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            format: match self.log_format {
                LogFormatArg::Text => LogFormat::Text,
                LogFormatArg::Json => LogFormat::Json,
            },
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }

    /// Run the CLI command
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Render(args) => commands::render::run(args),
            Commands::Validate(args) => commands::validate::run(args),
            Commands::Schema => commands::schema::run(),
        }
    }
}
