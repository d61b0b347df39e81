//! azure-webapp - Declarative Azure Web App management
//!
//! This is the main entry point for the azure-webapp CLI.

mod cli;

use anyhow::{Context, Result};
use azure_webapp::config::{Config, LogFormat, LoggingConfig};
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Initialize logging based on verbosity
    init_logging(cli.verbosity(), &config.logging)?;

    if cli.verbosity() >= 2 {
        eprintln!("{}", azure_webapp::version_info());
    }

    // Create command context
    let mut ctx = CommandContext::new(&cli, config);

    // Execute the appropriate command
    let exit_code = match &cli.command {
        Commands::Apply(args) => args.execute(&mut ctx).await?,
        Commands::Check(args) => args.execute(&mut ctx).await?,
        Commands::Sku(args) => args.execute(&mut ctx).await?,
        Commands::Validate(args) => args.execute(&mut ctx).await?,
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level and the logging config
fn init_logging(verbosity: u8, logging: &LoggingConfig) -> Result<()> {
    let filter = match verbosity {
        0 => logging.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let file_layer = match &logging.log_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let registry = tracing_subscriber::registry().with(env_filter).with(file_layer);
    match logging.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    Ok(())
}
