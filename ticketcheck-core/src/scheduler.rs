//! Drives reservation workers according to a load profile

use crate::error::Result;
use crate::profile::{LoadProfile, Stage};
use crate::worker::ReservationWorker;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

/// What the load phase did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub workers_spawned: u64,
    pub attempts: u64,
}

impl LoadSummary {
    pub fn attempts_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.attempts as f64 / secs
        } else {
            0.0
        }
    }
}

/// A running worker that can be asked to stop after its current attempt
struct WorkerHandle {
    stop: Arc<AtomicBool>,
    task: JoinHandle<u64>,
}

pub struct Scheduler {
    worker: ReservationWorker,
}

impl Scheduler {
    pub fn new(worker: ReservationWorker) -> Self {
        Self { worker }
    }

    /// Run the profile to completion. Every spawned worker is joined before
    /// this returns, so the aggregator is quiescent afterwards.
    pub async fn run(&self, profile: &LoadProfile) -> Result<LoadSummary> {
        profile.validate()?;

        let started = Instant::now();
        let (workers_spawned, attempts) = match profile {
            LoadProfile::Constant {
                concurrency,
                total_attempts,
                time_bound,
            } => {
                self.run_constant(*concurrency, *total_attempts, *time_bound)
                    .await?
            }
            LoadProfile::Staged { steps } => self.run_staged(steps).await?,
        };

        let summary = LoadSummary {
            elapsed: started.elapsed(),
            workers_spawned,
            attempts,
        };
        info!(
            workers = summary.workers_spawned,
            attempts = summary.attempts,
            elapsed = ?summary.elapsed,
            "Load phase finished"
        );
        Ok(summary)
    }

    async fn run_constant(
        &self,
        concurrency: usize,
        total_attempts: u64,
        time_bound: Duration,
    ) -> Result<(u64, u64)> {
        info!(concurrency, total_attempts, time_bound = ?time_bound, "Starting constant load");

        let claimed = Arc::new(AtomicU64::new(0));
        let deadline = Instant::now() + time_bound;
        let mut handles = Vec::with_capacity(concurrency);

        for index in 1..=concurrency as u64 {
            let worker = self.worker.clone();
            let claimed = claimed.clone();

            handles.push(tokio::spawn(async move {
                let mut iteration = 0u64;
                // Deadline first so an expired run never claims budget
                while Instant::now() < deadline
                    && claimed.fetch_add(1, Ordering::Relaxed) < total_attempts
                {
                    worker.attempt(index, iteration).await;
                    iteration += 1;
                }
                iteration
            }));
        }

        let mut attempts = 0;
        for handle in handles {
            attempts += handle.await?;
        }
        Ok((concurrency as u64, attempts))
    }

    async fn run_staged(&self, steps: &[Stage]) -> Result<(u64, u64)> {
        info!(steps = steps.len(), "Starting staged load");

        let mut next_index = 1u64;
        let mut active: Vec<WorkerHandle> = Vec::new();
        let mut retired: Vec<JoinHandle<u64>> = Vec::new();
        let mut step_end = Instant::now();

        for (number, step) in steps.iter().enumerate() {
            while active.len() < step.target {
                active.push(self.spawn_looping(next_index));
                next_index += 1;
            }
            while active.len() > step.target {
                if let Some(handle) = active.pop() {
                    handle.stop.store(true, Ordering::Relaxed);
                    retired.push(handle.task);
                }
            }
            debug!(
                step = number,
                target = step.target,
                duration = ?step.duration,
                "Entered load step"
            );

            // Step ends are measured from the start so they do not drift
            step_end += step.duration;
            sleep_until(step_end).await;
        }

        for handle in active.drain(..) {
            handle.stop.store(true, Ordering::Relaxed);
            retired.push(handle.task);
        }

        let mut attempts = 0;
        for task in retired {
            attempts += task.await?;
        }
        Ok((next_index - 1, attempts))
    }

    fn spawn_looping(&self, index: u64) -> WorkerHandle {
        let worker = self.worker.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();

        let task = tokio::spawn(async move {
            let mut iteration = 0u64;
            while !flag.load(Ordering::Relaxed) {
                worker.attempt(index, iteration).await;
                iteration += 1;
            }
            iteration
        });

        WorkerHandle { stop, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Router;
    use crate::tally::OutcomeAggregator;
    use crate::testing::{SimulatedTicketService, SimulationMode};
    use std::collections::HashSet;
    use ticketcheck_config::{StrategyId, DEFAULT_LOCK_TIMEOUT_MARKER};

    fn scheduler(service: Arc<SimulatedTicketService>) -> (Scheduler, Arc<OutcomeAggregator>) {
        let aggregator = Arc::new(OutcomeAggregator::new());
        let worker = ReservationWorker::new(
            service,
            1,
            Router::route(StrategyId::OptimisticLock),
            DEFAULT_LOCK_TIMEOUT_MARKER,
            aggregator.clone(),
        );
        (Scheduler::new(worker), aggregator)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_constant_profile_spends_exact_budget() {
        let service = Arc::new(SimulatedTicketService::new(100, SimulationMode::Correct));
        let (scheduler, aggregator) = scheduler(service.clone());

        let summary = scheduler
            .run(&LoadProfile::Constant {
                concurrency: 100,
                total_attempts: 1000,
                time_bound: Duration::from_secs(30),
            })
            .await
            .unwrap();

        assert_eq!(summary.workers_spawned, 100);
        assert_eq!(summary.attempts, 1000);

        let tally = aggregator.snapshot();
        assert_eq!(tally.total(), 1000);
        assert_eq!(tally.accepted, 100);
        assert_eq!(tally.business_rejected, 900);

        // No two attempts shared an identity
        let users = service.users_seen();
        let unique: HashSet<_> = users.iter().collect();
        assert_eq!(unique.len(), 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_constant_profile_stops_at_time_bound() {
        let service = Arc::new(
            SimulatedTicketService::new(1000, SimulationMode::Correct)
                .with_latency(Duration::from_millis(100)),
        );
        let (scheduler, aggregator) = scheduler(service);

        let summary = scheduler
            .run(&LoadProfile::Constant {
                concurrency: 2,
                total_attempts: 1000,
                time_bound: Duration::from_millis(450),
            })
            .await
            .unwrap();

        // Attempts start at 0, 100, .., 400 ms on each worker; the one in
        // flight at the deadline is allowed to finish.
        assert_eq!(summary.attempts, 10);
        assert_eq!(aggregator.snapshot().accepted, 10);
        assert!(summary.elapsed >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_staged_profile_tracks_targets() {
        let service = Arc::new(
            SimulatedTicketService::new(10_000, SimulationMode::Correct)
                .with_latency(Duration::from_millis(100)),
        );
        let (scheduler, _) = scheduler(service.clone());

        let summary = scheduler
            .run(&LoadProfile::Staged {
                steps: vec![
                    Stage { duration: Duration::from_secs(1), target: 2 },
                    Stage { duration: Duration::from_secs(1), target: 4 },
                    Stage { duration: Duration::from_secs(1), target: 1 },
                ],
            })
            .await
            .unwrap();

        // Retired workers are never revived: 4 distinct indices
        assert_eq!(summary.workers_spawned, 4);
        assert!(summary.attempts > 0);

        let workers: HashSet<String> = service
            .users_seen()
            .iter()
            .filter_map(|u| u.split('_').nth(1).map(str::to_string))
            .collect();
        assert_eq!(workers.len(), 4);
        assert!(summary.elapsed >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_invalid_profile_is_rejected() {
        let service = Arc::new(SimulatedTicketService::new(1, SimulationMode::Correct));
        let (scheduler, _) = scheduler(service);

        let result = scheduler
            .run(&LoadProfile::Staged {
                steps: vec![Stage { duration: Duration::from_secs(1), target: 0 }],
            })
            .await;
        assert!(result.is_err());
    }
}
