//! LearnShare category administration CLI entry point.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use learnshare_core::config::AppConfig;
use learnshare_core::error::AppError;

mod commands;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration(&cli) {
        Ok(c) => c,
        Err(e) => {
            output::print_error(&format!("Failed to load configuration: {e}"));
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = cli.execute(config).await {
        output::print_error(&e.to_string());
        if e.is_retryable() {
            output::print_warning("The hierarchy changed or was locked; retry once the conflict is resolved.");
        }
        std::process::exit(1);
    }
}

/// Load configuration from file, environment overlay and variables.
fn load_configuration(cli: &Cli) -> Result<AppConfig, AppError> {
    let env = std::env::var("LEARNSHARE_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&cli.config, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
