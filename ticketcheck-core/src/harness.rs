//! The three-phase run: baseline, load, verification

use crate::error::Result;
use crate::profile::{LoadProfile, Thresholds};
use crate::report::RunReport;
use crate::router::Router;
use crate::scheduler::Scheduler;
use crate::service::TicketService;
use crate::settle::SettlePolicy;
use crate::snapshot::SnapshotReader;
use crate::tally::OutcomeAggregator;
use crate::verifier::verify;
use crate::worker::ReservationWorker;
use chrono::Utc;
use std::sync::Arc;
use ticketcheck_config::{ResolvedStrategy, TicketcheckConfig};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Everything a run needs, resolved once from configuration
#[derive(Debug, Clone)]
pub struct HarnessSettings {
    pub ticket_id: u64,
    pub strategy: ResolvedStrategy,
    pub profile: LoadProfile,
    pub thresholds: Option<Thresholds>,
    pub settle: SettlePolicy,
    pub lock_timeout_marker: String,
}

impl HarnessSettings {
    pub fn from_config(config: &TicketcheckConfig) -> Result<Self> {
        let strategy = config.target.resolve_strategy();
        let profile = LoadProfile::from(config.load.profile_for(strategy.strategy));
        profile.validate()?;

        Ok(Self {
            ticket_id: config.target.ticket_id,
            profile,
            thresholds: config
                .load
                .thresholds_for(strategy.strategy)
                .map(Thresholds::from),
            settle: SettlePolicy::from_config(&config.settle, strategy.strategy),
            lock_timeout_marker: config.target.lock_timeout_marker.clone(),
            strategy,
        })
    }
}

pub struct Harness {
    service: Arc<dyn TicketService>,
    settings: HarnessSettings,
}

impl Harness {
    pub fn new(service: Arc<dyn TicketService>, settings: HarnessSettings) -> Self {
        Self { service, settings }
    }

    pub fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    /// Baseline, load, settle, final read, verify.
    ///
    /// Only an unschedulable profile or a crashed worker aborts the run. A
    /// failed final read yields a report without verification.
    pub async fn run(&self) -> Result<RunReport> {
        let settings = &self.settings;
        let strategy = settings.strategy.strategy;
        let ticket_id = settings.ticket_id;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(
            %run_id,
            ticket_id,
            strategy = strategy.as_str(),
            profile = settings.profile.kind(),
            "Starting consistency run"
        );

        let reader = SnapshotReader::new(self.service.clone());
        let baseline = reader.read_baseline(ticket_id).await;
        info!(
            stock = baseline.snapshot.stock,
            reservation_count = baseline.snapshot.reservation_count,
            "Baseline recorded"
        );

        let aggregator = Arc::new(OutcomeAggregator::new());
        let worker = ReservationWorker::new(
            self.service.clone(),
            ticket_id,
            Router::route(strategy),
            &settings.lock_timeout_marker,
            aggregator.clone(),
        );
        let load = Scheduler::new(worker).run(&settings.profile).await?;

        let settle = settings.settle.settle(&reader, ticket_id).await;

        let (final_snapshot, final_read_error) = match reader.read(ticket_id).await {
            Ok(snapshot) => (Some(snapshot), None),
            Err(e) => {
                error!(ticket_id, error = %e, "Final snapshot read failed, run is inconclusive");
                (None, Some(e.to_string()))
            }
        };

        let tally = aggregator.snapshot();
        let latency = aggregator.latency_stats();
        let thresholds = settings
            .thresholds
            .map(|t| t.evaluate(&tally, &latency));
        let verification = final_snapshot.map(|f| verify(&baseline.snapshot, &f, &tally));

        if let Some(v) = &verification {
            if v.is_consistent() {
                info!(verdict = %v.verdict, "Verification passed");
            } else {
                warn!(
                    verdict = %v.verdict,
                    overbooked = v.overbooked,
                    race_condition = v.race_condition_detected,
                    negative_stock = v.negative_stock,
                    "Verification failed"
                );
            }
        }
        if thresholds.is_some_and(|t| !t.passed) {
            warn!("Load thresholds breached");
        }

        Ok(RunReport {
            run_id,
            strategy,
            requested_strategy: settings.strategy.requested.clone(),
            strategy_fell_back: settings.strategy.fell_back,
            ticket_id,
            started_at,
            finished_at: Utc::now(),
            profile: settings.profile.clone(),
            attempts_per_second: load.attempts_per_second(),
            load,
            settle_policy: settings.settle,
            settle,
            baseline: baseline.snapshot,
            baseline_warning: baseline.warning,
            final_snapshot,
            final_read_error,
            tally,
            latency,
            thresholds,
            verification,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RunOutcome;
    use crate::snapshot::TicketSnapshot;
    use crate::testing::{SimulatedTicketService, SimulationMode};
    use crate::verifier::Verdict;
    use std::time::Duration;
    use ticketcheck_config::{ProfileConfig, SettleMode, StrategyId};

    fn config(strategy: &str, concurrency: usize, total_attempts: u64) -> TicketcheckConfig {
        let mut config = TicketcheckConfig::default();
        config.target.strategy = Some(strategy.to_string());
        config.load.profile = Some(ProfileConfig::Constant {
            concurrency,
            total_attempts,
            time_bound: Duration::from_secs(30),
        });
        config.settle.mode = SettleMode::None;
        config
    }

    async fn run(service: Arc<SimulatedTicketService>, config: &TicketcheckConfig) -> RunReport {
        let settings = HarnessSettings::from_config(config).unwrap();
        Harness::new(service, settings).run().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_correct_service_is_certified() {
        let service = Arc::new(SimulatedTicketService::new(100, SimulationMode::Correct));
        let report = run(service, &config("row-lock", 100, 1000)).await;

        assert_eq!(report.tally.accepted, 100);
        assert_eq!(report.tally.business_rejected, 900);
        assert_eq!(report.final_snapshot, Some(TicketSnapshot::new(0, 100)));

        let verification = report.verification.unwrap();
        assert!(!verification.overbooked);
        assert!(!verification.race_condition_detected);
        assert!(!verification.negative_stock);
        assert_eq!(report.outcome(), RunOutcome::Consistent);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overselling_service_is_caught() {
        let service = Arc::new(SimulatedTicketService::new(100, SimulationMode::Overselling));
        let report = run(service, &config("synchronized", 20, 120)).await;

        let verification = report.verification.unwrap();
        assert!(verification.overbooked);
        assert!(verification.race_condition_detected);
        assert!(!verification.negative_stock);
        assert_eq!(verification.verdict, Verdict::Overbooked);
        assert_eq!(report.exit_code(false), 1);
    }

    #[tokio::test]
    async fn test_skewed_stock_is_a_race() {
        let service = Arc::new(SimulatedTicketService::new(
            50,
            SimulationMode::SkewedStock { every: 5 },
        ));
        let report = run(service, &config("optimistic", 5, 40)).await;

        let verification = report.verification.unwrap();
        assert!(!verification.overbooked);
        assert!(verification.race_condition_detected);
        assert_eq!(verification.verdict, Verdict::RaceCondition);
    }

    #[tokio::test]
    async fn test_lock_contention_is_tallied() {
        let service = Arc::new(SimulatedTicketService::new(
            1000,
            SimulationMode::LockContended { every: 4 },
        ));
        let report = run(service, &config("redisson", 4, 100)).await;

        assert_eq!(report.strategy, StrategyId::DistributedLock);
        assert_eq!(report.tally.lock_timeout_rejected, 25);
        assert_eq!(report.tally.accepted, 75);
        assert!(report.verification.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_failed_baseline_still_runs() {
        let service = Arc::new(SimulatedTicketService::new(10, SimulationMode::Correct));
        service.fail_snapshot_reads(1);
        let report = run(service, &config("row-lock", 2, 20)).await;

        assert_eq!(report.baseline, TicketSnapshot::ZERO);
        assert!(report.baseline_warning.is_some());
        // Against a zero baseline every real reservation looks like overbooking
        assert!(report.verification.unwrap().overbooked);
    }

    #[tokio::test]
    async fn test_failed_final_read_is_inconclusive() {
        let service = Arc::new(SimulatedTicketService::new(10, SimulationMode::Correct));
        // Baseline read succeeds, the final one does not
        service.limit_snapshot_reads(1);
        let report = run(service, &config("row-lock", 2, 4)).await;

        assert!(report.baseline_warning.is_none());
        assert!(report.final_snapshot.is_none());
        assert!(report.final_read_error.is_some());
        assert!(report.verification.is_none());
        assert_eq!(report.tally.accepted, 4);
        assert_eq!(report.outcome(), RunOutcome::Inconclusive);
        assert_eq!(report.exit_code(false), 3);
    }

    #[tokio::test]
    async fn test_unknown_strategy_falls_back() {
        let service = Arc::new(SimulatedTicketService::new(10, SimulationMode::Correct));
        let report = run(service, &config("spinlock", 2, 4)).await;

        assert_eq!(report.strategy, StrategyId::RowLock);
        assert!(report.strategy_fell_back);
        assert_eq!(report.requested_strategy.as_deref(), Some("spinlock"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_strategy_defaults() {
        let mut config = TicketcheckConfig::default();
        config.target.strategy = Some("kafka".to_string());
        config.load.profile = Some(ProfileConfig::Constant {
            concurrency: 2,
            total_attempts: 10,
            time_bound: Duration::from_secs(5),
        });

        let settings = HarnessSettings::from_config(&config).unwrap();
        assert_eq!(
            settings.settle,
            SettlePolicy::Fixed {
                wait: Duration::from_secs(20)
            }
        );
        assert!(settings.thresholds.is_some());

        let service = Arc::new(SimulatedTicketService::new(100, SimulationMode::Correct));
        let report = Harness::new(service, settings).run().await.unwrap();
        assert_eq!(report.settle.waited, Duration::from_secs(20));
        assert!(report.thresholds.unwrap().passed);
    }
}
