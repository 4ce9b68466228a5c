//! CLI command definitions and dispatch.

pub mod category;
pub mod migrate;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use learnshare_core::config::AppConfig;
use learnshare_core::error::AppError;

/// LearnShare category hierarchy administration
#[derive(Debug, Parser)]
#[command(name = "learnshare", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Category hierarchy management
    Category(category::CategoryArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, &config).await,
            Commands::Category(args) => category::execute(args, &config, self.format).await,
        }
    }
}
