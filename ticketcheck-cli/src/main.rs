mod cli;
mod commands;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ConfigCommands};
use std::io::Write;
use std::path::PathBuf;
use ticketcheck_config::{ConfigLoader, TicketcheckConfig};
use ticketcheck_logging::init_logging;
use tracing::{debug, info};

/// Load configuration from file, or from environment and defaults.
///
/// An explicit path that does not exist is an error. Logging is not set up
/// yet at this point, so a warning would never reach the operator.
fn load_config(config_path: Option<&PathBuf>) -> Result<TicketcheckConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            if !path.exists() {
                bail!("Configuration file not found: {:?}", path);
            }
            loader
                .from_file(path)
                .context(format!("Failed to load configuration from {:?}", path))
        }
        None => loader
            .from_env()
            .context("Failed to load configuration from environment"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first; it carries the logging settings
    let config = load_config(cli.config.as_ref())?;
    init_logging(&config.logging, cli.log_level.as_deref())?;

    match &cli.config {
        Some(path) => info!("Configuration loaded from {:?}", path),
        None => debug!("No configuration file specified, using environment and defaults"),
    }

    let exit_code = match &cli.command {
        Commands::Run(args) => commands::run_command(config, args).await?,
        Commands::Snapshot { ticket_id, output } => {
            commands::snapshot_command(&config, *ticket_id, *output).await?;
            0
        }
        Commands::Verify {
            baseline,
            final_snapshot,
            tally,
            output,
        } => commands::verify_command(baseline, final_snapshot, tally.as_deref(), *output)?,
        Commands::Strategies => {
            print!("{}", commands::strategies_table());
            0
        }
        Commands::Config { config_cmd } => {
            match config_cmd {
                ConfigCommands::Validate { config_file } => {
                    commands::handle_config_validate(config_file)?
                }
                ConfigCommands::Generate {
                    scenario,
                    output,
                    force,
                } => commands::handle_config_generate(scenario.as_deref(), output, *force)?,
            }
            0
        }
    };

    if exit_code != 0 {
        debug!(exit_code, "Exiting with non-zero status");
        std::io::stdout().flush().context("Failed to flush stdout")?;
        std::process::exit(exit_code);
    }
    Ok(())
}
