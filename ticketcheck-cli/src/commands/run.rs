//! `ticketcheck run`

use crate::cli::{OutputFormat, RunArgs};
use anyhow::{Context, Result};
use std::sync::Arc;
use ticketcheck_config::domains::load::{
    STANDARD_CONCURRENCY, STANDARD_TIME_BOUND, STANDARD_TOTAL_ATTEMPTS,
};
use ticketcheck_config::{ProfileConfig, SettleMode, TicketcheckConfig};
use ticketcheck_core::{Harness, HarnessSettings};
use ticketcheck_http::HttpTicketService;
use tracing::info;

/// Fold command line flags into the loaded configuration.
///
/// Constant-profile flags start from whatever constant profile the
/// configuration already selects for the strategy, so `--attempts 50`
/// alone keeps the configured concurrency and time bound.
pub fn apply_run_args(config: &mut TicketcheckConfig, args: &RunArgs) -> Result<()> {
    if let Some(strategy) = &args.strategy {
        config.target.strategy = Some(strategy.clone());
    }
    if let Some(ticket_id) = args.ticket_id {
        config.target.ticket_id = ticket_id;
    }
    if let Some(base_url) = &args.base_url {
        config.target.base_url = base_url.clone();
    }

    if args.staged {
        config.load.profile = Some(ProfileConfig::standard_staged());
    } else if args.concurrency.is_some() || args.attempts.is_some() || args.time_bound.is_some() {
        let strategy = config.target.resolve_strategy().strategy;
        let (mut concurrency, mut total_attempts, mut time_bound) =
            match config.load.profile_for(strategy) {
                ProfileConfig::Constant {
                    concurrency,
                    total_attempts,
                    time_bound,
                } => (concurrency, total_attempts, time_bound),
                ProfileConfig::Staged { .. } => (
                    STANDARD_CONCURRENCY,
                    STANDARD_TOTAL_ATTEMPTS,
                    STANDARD_TIME_BOUND,
                ),
            };
        if let Some(n) = args.concurrency {
            concurrency = n;
        }
        if let Some(n) = args.attempts {
            total_attempts = n;
        }
        if let Some(d) = args.time_bound {
            time_bound = d;
        }
        config.load.profile = Some(ProfileConfig::Constant {
            concurrency,
            total_attempts,
            time_bound,
        });
    }

    if let Some(wait) = args.settle {
        config.settle.mode = SettleMode::Fixed;
        config.settle.wait = Some(wait);
    }

    config
        .validate_all()
        .context("Invalid configuration after applying command line flags")?;
    Ok(())
}

/// Run the harness and return the process exit code
pub async fn run_command(mut config: TicketcheckConfig, args: &RunArgs) -> Result<i32> {
    apply_run_args(&mut config, args)?;

    let settings = HarnessSettings::from_config(&config).context("Failed to build run settings")?;
    let service = HttpTicketService::new(&config.target.base_url, config.http.clone().into())
        .context("Failed to create reservation service client")?;

    let harness = Harness::new(Arc::new(service), settings);
    info!(
        base_url = %config.target.base_url,
        ticket_id = harness.settings().ticket_id,
        strategy = harness.settings().strategy.strategy.as_str(),
        "Starting run"
    );

    let report = harness.run().await.context("Run aborted")?;

    match args.output {
        OutputFormat::Json => {
            let json = report.to_json().context("Failed to format report as JSON")?;
            println!("{}", json);
        }
        OutputFormat::Text => print!("{}", report),
    }

    Ok(report.exit_code(args.fail_on_threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_flags_override_config() {
        let mut config = TicketcheckConfig::default();
        let args = RunArgs {
            strategy: Some("redisson".to_string()),
            ticket_id: Some(7),
            base_url: Some("http://tickets.internal:9000".to_string()),
            attempts: Some(50),
            settle: Some(Duration::from_secs(1)),
            ..RunArgs::default()
        };

        apply_run_args(&mut config, &args).unwrap();

        assert_eq!(config.target.strategy.as_deref(), Some("redisson"));
        assert_eq!(config.target.ticket_id, 7);
        assert_eq!(config.target.base_url, "http://tickets.internal:9000");
        assert_eq!(
            config.load.profile,
            Some(ProfileConfig::Constant {
                concurrency: 100,
                total_attempts: 50,
                time_bound: Duration::from_secs(30),
            })
        );
        assert_eq!(config.settle.mode, SettleMode::Fixed);
        assert_eq!(config.settle.wait, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_constant_flags_replace_queued_ramp() {
        let mut config = TicketcheckConfig::default();
        let args = RunArgs {
            strategy: Some("kafka".to_string()),
            concurrency: Some(5),
            ..RunArgs::default()
        };

        apply_run_args(&mut config, &args).unwrap();
        assert!(matches!(
            config.load.profile,
            Some(ProfileConfig::Constant { concurrency: 5, .. })
        ));
    }

    #[test]
    fn test_staged_flag() {
        let mut config = TicketcheckConfig::default();
        let args = RunArgs {
            staged: true,
            ..RunArgs::default()
        };

        apply_run_args(&mut config, &args).unwrap();
        assert_eq!(config.load.profile, Some(ProfileConfig::standard_staged()));
    }

    #[test]
    fn test_invalid_flags_are_rejected() {
        let mut config = TicketcheckConfig::default();
        let args = RunArgs {
            concurrency: Some(0),
            ..RunArgs::default()
        };
        assert!(apply_run_args(&mut config, &args).is_err());

        let mut config = TicketcheckConfig::default();
        let args = RunArgs {
            base_url: Some(String::new()),
            ..RunArgs::default()
        };
        assert!(apply_run_args(&mut config, &args).is_err());
    }
}
