//! Database migration commands.

use clap::{Args, Subcommand};

use crate::output;
use learnshare_core::config::AppConfig;
use learnshare_core::error::AppError;
use learnshare_database::DatabasePool;
use learnshare_database::connection::mask_password;

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration subcommand
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Run all pending migrations
    Run,
    /// Check that the database is reachable
    Check,
}

/// Execute migration commands
pub async fn execute(args: &MigrateArgs, config: &AppConfig) -> Result<(), AppError> {
    let db = DatabasePool::connect(&config.database).await?;

    match &args.command {
        MigrateCommand::Run => {
            println!("Running database migrations...");
            learnshare_database::migration::run_migrations(db.pool()).await?;
            output::print_success("All migrations applied successfully.");
        }
        MigrateCommand::Check => {
            db.health_check().await?;
            output::print_success(&format!(
                "Database reachable at {}",
                mask_password(&config.database.url)
            ));
        }
    }

    db.close().await;
    Ok(())
}
