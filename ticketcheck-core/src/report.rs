//! End-of-run report and its renderings

use crate::profile::{LoadProfile, ThresholdReport};
use crate::scheduler::LoadSummary;
use crate::settle::{SettleOutcome, SettlePolicy};
use crate::snapshot::{BaselineWarning, TicketSnapshot};
use crate::tally::{LatencyStats, OutcomeTally};
use crate::verifier::VerificationReport;
use chrono::{DateTime, Utc};
use colored::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use ticketcheck_config::StrategyId;
use uuid::Uuid;

/// Overall result of a run, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Consistent,
    ThresholdBreached,
    InvariantViolated,
    /// The final snapshot could not be read
    Inconclusive,
}

impl RunOutcome {
    /// Process exit code. A threshold breach only fails the process when asked.
    pub fn exit_code(&self, fail_on_threshold: bool) -> i32 {
        match self {
            RunOutcome::Consistent => 0,
            RunOutcome::ThresholdBreached if fail_on_threshold => 2,
            RunOutcome::ThresholdBreached => 0,
            RunOutcome::InvariantViolated => 1,
            RunOutcome::Inconclusive => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub strategy: StrategyId,
    /// Identifier as configured, when it differed from the resolved one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_strategy: Option<String>,
    pub strategy_fell_back: bool,
    pub ticket_id: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    pub profile: LoadProfile,
    pub load: LoadSummary,
    pub settle_policy: SettlePolicy,
    pub settle: SettleOutcome,

    pub baseline: TicketSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_warning: Option<BaselineWarning>,
    #[serde(rename = "final", skip_serializing_if = "Option::is_none")]
    pub final_snapshot: Option<TicketSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_read_error: Option<String>,

    pub tally: OutcomeTally,
    pub latency: LatencyStats,
    pub attempts_per_second: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<ThresholdReport>,
    /// Absent when the run is inconclusive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationReport>,
}

impl RunReport {
    pub fn outcome(&self) -> RunOutcome {
        match &self.verification {
            None => RunOutcome::Inconclusive,
            Some(v) if !v.is_consistent() => RunOutcome::InvariantViolated,
            Some(_) if self.thresholds.is_some_and(|t| !t.passed) => RunOutcome::ThresholdBreached,
            Some(_) => RunOutcome::Consistent,
        }
    }

    pub fn exit_code(&self, fail_on_threshold: bool) -> i32 {
        self.outcome().exit_code(fail_on_threshold)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "Reservation consistency run".bright_cyan().bold())?;
        writeln!(f, "  run id      {}", self.run_id)?;
        writeln!(f, "  strategy    {}", self.strategy.as_str().bold())?;
        if let Some(requested) = &self.requested_strategy {
            if self.strategy_fell_back {
                writeln!(
                    f,
                    "  {} unrecognised strategy '{}', used fallback",
                    "⚠".bright_yellow().bold(),
                    requested
                )?;
            }
        }
        writeln!(f, "  ticket      {}", self.ticket_id)?;
        writeln!(
            f,
            "  started     {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(
            f,
            "  load        {} profile, {} workers, {} attempts in {:.2}s ({:.1}/s)",
            self.profile.kind(),
            self.load.workers_spawned,
            self.load.attempts,
            self.load.elapsed.as_secs_f64(),
            self.attempts_per_second
        )?;
        if !self.settle.waited.is_zero() || self.settle.reads > 0 {
            writeln!(
                f,
                "  settled     {:.2}s{}",
                self.settle.waited.as_secs_f64(),
                if self.settle.stable { "" } else { " (still changing)" }
            )?;
        }

        writeln!(f)?;
        writeln!(f, "{}", "Snapshots".bright_cyan().bold())?;
        writeln!(
            f,
            "  baseline    stock={} reservationCount={}",
            self.baseline.stock, self.baseline.reservation_count
        )?;
        if let Some(warning) = &self.baseline_warning {
            writeln!(
                f,
                "  {} {} ({})",
                "⚠".bright_yellow().bold(),
                warning.message.bright_yellow(),
                warning.error
            )?;
        }
        match (&self.final_snapshot, &self.final_read_error) {
            (Some(snapshot), _) => writeln!(
                f,
                "  final       stock={} reservationCount={}",
                snapshot.stock, snapshot.reservation_count
            )?,
            (None, error) => writeln!(
                f,
                "  final       {} {}",
                "unavailable:".bright_red(),
                error.as_deref().unwrap_or("unknown error")
            )?,
        }

        writeln!(f)?;
        writeln!(f, "{}", "Outcomes".bright_cyan().bold())?;
        writeln!(f, "  accepted               {}", self.tally.accepted)?;
        writeln!(f, "  business rejected      {}", self.tally.business_rejected)?;
        writeln!(f, "  lock timeout rejected  {}", self.tally.lock_timeout_rejected)?;
        writeln!(f, "  transport errors       {}", self.tally.transport_error)?;
        writeln!(
            f,
            "  latency ms             min {:.1} / mean {:.1} / p50 {:.1} / p95 {:.1} / p99 {:.1} / max {:.1}",
            self.latency.min_ms,
            self.latency.mean_ms,
            self.latency.p50_ms,
            self.latency.p95_ms,
            self.latency.p99_ms,
            self.latency.max_ms
        )?;

        if let Some(thresholds) = &self.thresholds {
            writeln!(f)?;
            writeln!(f, "{}", "Thresholds".bright_cyan().bold())?;
            if let (Some(max), Some(passed)) = (thresholds.max_p95_latency_ms, thresholds.p95_passed) {
                writeln!(
                    f,
                    "  {} p95 {:.1}ms < {:.0}ms",
                    mark(passed),
                    thresholds.observed_p95_latency_ms,
                    max
                )?;
            }
            if let (Some(max), Some(passed)) = (thresholds.max_error_rate, thresholds.error_rate_passed) {
                writeln!(
                    f,
                    "  {} error rate {:.2}% < {:.2}%",
                    mark(passed),
                    thresholds.observed_error_rate * 100.0,
                    max * 100.0
                )?;
            }
        }

        writeln!(f)?;
        match &self.verification {
            Some(verification) => write!(f, "{}", verification),
            None => {
                writeln!(f, "{}", "Verification".bright_cyan().bold())?;
                writeln!(
                    f,
                    "  {} inconclusive: final snapshot could not be read",
                    "?".bright_yellow().bold()
                )
            }
        }
    }
}

/// Text block for a verification, shared with offline verification
impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "Verification".bright_cyan().bold())?;
        writeln!(
            f,
            "  reservation delta {}, stock delta {}",
            self.reservation_delta, self.stock_delta
        )?;
        writeln!(f, "  {} no overbooking", mark(!self.overbooked))?;
        writeln!(
            f,
            "  {} stock and reservations moved together",
            mark(!self.race_condition_detected)
        )?;
        writeln!(f, "  {} stock not negative", mark(!self.negative_stock))?;
        if self.unapplied_acceptances != 0 {
            writeln!(
                f,
                "  {} {} accepted attempts without a recorded reservation",
                "ℹ".bright_blue().bold(),
                self.unapplied_acceptances
            )?;
        }

        let summary = self.verdict.summary();
        if self.is_consistent() {
            writeln!(f, "{} {}", "✓".bright_green().bold(), summary.bright_green())
        } else {
            writeln!(f, "{} {}", "✗".bright_red().bold(), summary.bright_red())
        }
    }
}

fn mark(passed: bool) -> ColoredString {
    if passed {
        "✓".bright_green().bold()
    } else {
        "✗".bright_red().bold()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::verify;
    use std::time::Duration;

    fn report(final_snapshot: Option<TicketSnapshot>) -> RunReport {
        let baseline = TicketSnapshot::new(100, 0);
        let tally = OutcomeTally {
            accepted: 100,
            business_rejected: 900,
            ..OutcomeTally::default()
        };
        RunReport {
            run_id: Uuid::new_v4(),
            strategy: StrategyId::RowLock,
            requested_strategy: None,
            strategy_fell_back: false,
            ticket_id: 1,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            profile: LoadProfile::Constant {
                concurrency: 100,
                total_attempts: 1000,
                time_bound: Duration::from_secs(30),
            },
            load: LoadSummary {
                elapsed: Duration::from_secs(2),
                workers_spawned: 100,
                attempts: 1000,
            },
            settle_policy: SettlePolicy::None,
            settle: SettleOutcome {
                waited: Duration::ZERO,
                reads: 0,
                stable: true,
            },
            baseline,
            baseline_warning: None,
            final_snapshot,
            final_read_error: final_snapshot.is_none().then(|| "refused".to_string()),
            tally,
            latency: LatencyStats::default(),
            attempts_per_second: 500.0,
            thresholds: None,
            verification: final_snapshot.map(|f| verify(&baseline, &f, &tally)),
        }
    }

    #[test]
    fn test_outcomes_and_exit_codes() {
        let consistent = report(Some(TicketSnapshot::new(0, 100)));
        assert_eq!(consistent.outcome(), RunOutcome::Consistent);
        assert_eq!(consistent.exit_code(true), 0);

        let violated = report(Some(TicketSnapshot::new(5, 120)));
        assert_eq!(violated.outcome(), RunOutcome::InvariantViolated);
        assert_eq!(violated.exit_code(false), 1);

        let inconclusive = report(None);
        assert_eq!(inconclusive.outcome(), RunOutcome::Inconclusive);
        assert_eq!(inconclusive.exit_code(false), 3);
    }

    #[test]
    fn test_threshold_breach_exit_code() {
        let mut breached = report(Some(TicketSnapshot::new(0, 100)));
        breached.thresholds = Some(ThresholdReport {
            max_p95_latency_ms: Some(5000.0),
            observed_p95_latency_ms: 7000.0,
            p95_passed: Some(false),
            max_error_rate: None,
            observed_error_rate: 0.9,
            error_rate_passed: None,
            passed: false,
        });

        assert_eq!(breached.outcome(), RunOutcome::ThresholdBreached);
        assert_eq!(breached.exit_code(false), 0);
        assert_eq!(breached.exit_code(true), 2);
    }

    #[test]
    fn test_json_shape() {
        let json: serde_json::Value =
            serde_json::from_str(&report(Some(TicketSnapshot::new(0, 100))).to_json().unwrap())
                .unwrap();

        assert_eq!(json["strategy"], "row-lock");
        assert_eq!(json["final"]["reservationCount"], 100);
        assert_eq!(json["verification"]["overbooked"], false);
        assert_eq!(json["verification"]["verdict"], "consistent");
        assert_eq!(json["tally"]["business_rejected"], 900);
        assert!(json.get("final_read_error").is_none());

        let inconclusive: serde_json::Value =
            serde_json::from_str(&report(None).to_json().unwrap()).unwrap();
        assert!(inconclusive.get("verification").is_none());
        assert_eq!(inconclusive["final_read_error"], "refused");
    }

    #[test]
    fn test_text_rendering() {
        colored::control::set_override(false);

        let text = report(Some(TicketSnapshot::new(5, 120))).to_string();
        assert!(text.contains("strategy    row-lock"));
        assert!(text.contains("final       stock=5 reservationCount=120"));
        assert!(text.contains("✗ no overbooking"));
        assert!(text.contains("Overbooking"));

        let text = report(None).to_string();
        assert!(text.contains("inconclusive"));
        assert!(text.ends_with("could not be read\n"));

        let verification = verify(
            &TicketSnapshot::new(100, 0),
            &TicketSnapshot::new(0, 100),
            &OutcomeTally {
                accepted: 130,
                ..OutcomeTally::default()
            },
        );
        let text = verification.to_string();
        assert!(text.starts_with("Verification\n"));
        assert!(text.contains("ℹ 30 accepted attempts without a recorded reservation"));
        assert!(text.ends_with("✓ Inventory is consistent: no overbooking, stock and reservations moved together\n"));
    }
}
