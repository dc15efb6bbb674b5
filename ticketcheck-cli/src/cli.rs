//! CLI argument parsing definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use ticketcheck_config::domains::utils::parse_env_duration;

#[derive(Parser)]
#[command(author, version, about = "Concurrency-correctness harness for ticket reservation services", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// How results are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Snapshot the ticket, drive reservation load, then verify consistency
    Run(RunArgs),

    /// Read and print the current ticket snapshot
    Snapshot {
        /// Ticket to read
        #[arg(long, value_name = "ID")]
        ticket_id: Option<u64>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Verify recorded snapshots without contacting the service
    Verify {
        /// JSON file holding the baseline snapshot
        #[arg(long, value_name = "FILE")]
        baseline: PathBuf,

        /// JSON file holding the final snapshot
        #[arg(long = "final", value_name = "FILE")]
        final_snapshot: PathBuf,

        /// JSON file holding the outcome tally of the run
        #[arg(long, value_name = "FILE")]
        tally: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// List supported strategies, their routes and default settling waits
    Strategies,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Debug, Default, clap::Args)]
pub struct RunArgs {
    /// Strategy identifier or alias (e.g. row-lock, pessimistic)
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<String>,

    /// Ticket to reserve
    #[arg(long, value_name = "ID")]
    pub ticket_id: Option<u64>,

    /// Base URL of the reservation service
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Number of concurrent workers (constant profile)
    #[arg(long, value_name = "N", conflicts_with = "staged")]
    pub concurrency: Option<usize>,

    /// Shared attempt budget (constant profile)
    #[arg(long, value_name = "N", conflicts_with = "staged")]
    pub attempts: Option<u64>,

    /// Wall-clock bound on the load phase, e.g. 30s
    #[arg(long, value_name = "DURATION", value_parser = parse_env_duration, conflicts_with = "staged")]
    pub time_bound: Option<Duration>,

    /// Use the standard staged ramp instead of a constant worker pool
    #[arg(long)]
    pub staged: bool,

    /// Fixed settling wait before the final snapshot, e.g. 2s
    #[arg(long, value_name = "DURATION", value_parser = parse_env_duration)]
    pub settle: Option<Duration>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Exit with code 2 when a threshold is breached
    #[arg(long)]
    pub fail_on_threshold: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Generate a sample configuration file
    Generate {
        /// Built-in scenario to spell out (a strategy identifier or alias)
        #[arg(long, value_name = "NAME")]
        scenario: Option<String>,

        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}
