//! Read-only commands: `snapshot`, `verify` and `strategies`

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use colored::*;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use ticketcheck_config::{ProfileConfig, SettleConfig, TicketcheckConfig};
use ticketcheck_core::{verify, OutcomeTally, Router, StrategyId, TicketService, TicketSnapshot};
use ticketcheck_http::HttpTicketService;
use tracing::info;

/// Print the current snapshot of a ticket
pub async fn snapshot_command(
    config: &TicketcheckConfig,
    ticket_id: Option<u64>,
    output: OutputFormat,
) -> Result<()> {
    let ticket_id = ticket_id.unwrap_or(config.target.ticket_id);
    let service = HttpTicketService::new(&config.target.base_url, config.http.clone().into())
        .context("Failed to create reservation service client")?;

    let snapshot = service
        .fetch_snapshot(ticket_id)
        .await
        .with_context(|| format!("Failed to read snapshot of ticket {}", ticket_id))?;

    match output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&snapshot).context("Failed to format snapshot")?
        ),
        OutputFormat::Text => println!(
            "ticket {}: stock {}, reservations {}",
            ticket_id, snapshot.stock, snapshot.reservation_count
        ),
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} from {:?}", what, path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {} in {:?}", what, path))
}

/// Verify recorded snapshots. Returns 1 when an invariant is violated.
pub fn verify_command(
    baseline: &Path,
    final_snapshot: &Path,
    tally: Option<&Path>,
    output: OutputFormat,
) -> Result<i32> {
    let baseline: TicketSnapshot = read_json(baseline, "baseline snapshot")?;
    let final_snapshot: TicketSnapshot = read_json(final_snapshot, "final snapshot")?;
    let tally: OutcomeTally = match tally {
        Some(path) => read_json(path, "outcome tally")?,
        None => OutcomeTally::default(),
    };

    let report = verify(&baseline, &final_snapshot, &tally);
    info!(verdict = %report.verdict, "Offline verification finished");

    match output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to format verification")?
        ),
        OutputFormat::Text => print!("{}", report),
    }

    Ok(if report.is_consistent() { 0 } else { 1 })
}

fn describe_profile(profile: &ProfileConfig) -> String {
    match profile {
        ProfileConfig::Constant {
            concurrency,
            total_attempts,
            time_bound,
        } => format!(
            "constant {} workers / {} attempts / {}s",
            concurrency,
            total_attempts,
            time_bound.as_secs()
        ),
        ProfileConfig::Staged { steps } => {
            let steps: Vec<String> = steps
                .iter()
                .map(|s| format!("{}s→{}", s.duration.as_secs(), s.target))
                .collect();
            format!("staged {}", steps.join(", "))
        }
    }
}

fn trade_off(strategy: StrategyId) -> &'static str {
    match strategy {
        StrategyId::InProcessLock => "single instance only; every request is serialised",
        StrategyId::RowLock => "consistent across instances; lock waits and deadlocks under load",
        StrategyId::OptimisticLock => "cheap at low contention; retry storms at high contention",
        StrategyId::DistributedLock => "works across instances; lock store is a single point of failure",
        StrategyId::QueuedAsync => "absorbs spikes; only eventually consistent",
    }
}

fn strategy_entry(strategy: StrategyId) -> String {
    let route = Router::route(strategy);
    let wait = SettleConfig::strategy_default_wait(strategy);
    let default_marker = if strategy == StrategyId::default() {
        " (default)".dimmed().to_string()
    } else {
        String::new()
    };
    let settle = if wait.is_zero() {
        "none".to_string()
    } else {
        format!("{}s", wait.as_secs())
    };
    let acknowledged = if strategy.is_asynchronous() {
        " (acknowledged before applied)"
    } else {
        ""
    };

    let lines = [
        format!(
            "{} ({}){}",
            strategy.as_str().bright_cyan().bold(),
            strategy.alias(),
            default_marker
        ),
        format!("  route:   {} {}", route.method, route.path),
        format!("  settle:  {}{}", settle, acknowledged),
        format!(
            "  profile: {}",
            describe_profile(&ProfileConfig::for_strategy(strategy))
        ),
        format!("  {}", trade_off(strategy).dimmed()),
    ];
    lines.join("\n") + "\n"
}

/// Table of every strategy the harness can drive
pub fn strategies_table() -> String {
    StrategyId::ALL.into_iter().map(strategy_entry).collect()
}
