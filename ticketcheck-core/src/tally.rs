//! Outcome aggregation across workers

use crate::worker::AttemptOutcome;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Per-kind attempt counts for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeTally {
    pub accepted: u64,
    pub business_rejected: u64,
    pub lock_timeout_rejected: u64,
    pub transport_error: u64,
}

impl OutcomeTally {
    pub fn get(&self, outcome: AttemptOutcome) -> u64 {
        match outcome {
            AttemptOutcome::Accepted => self.accepted,
            AttemptOutcome::BusinessRejected => self.business_rejected,
            AttemptOutcome::LockTimeoutRejected => self.lock_timeout_rejected,
            AttemptOutcome::TransportError => self.transport_error,
        }
    }

    /// Saturates at `u64::MAX`; tallies read from files are unchecked
    pub fn total(&self) -> u64 {
        self.accepted
            .saturating_add(self.business_rejected)
            .saturating_add(self.lock_timeout_rejected)
            .saturating_add(self.transport_error)
    }

    /// Fraction of attempts that were not accepted; 0 for an empty tally
    pub fn error_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (total - self.accepted) as f64 / total as f64
    }
}

/// Latency distribution in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: u64,
    pub min_ms: f64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

impl LatencyStats {
    pub fn from_samples(samples: &[Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let total: Duration = sorted.iter().sum();
        Self {
            count: sorted.len() as u64,
            min_ms: as_ms(sorted[0]),
            mean_ms: as_ms(total) / sorted.len() as f64,
            p50_ms: as_ms(percentile(&sorted, 50)),
            p95_ms: as_ms(percentile(&sorted, 95)),
            p99_ms: as_ms(percentile(&sorted, 99)),
            max_ms: as_ms(sorted[sorted.len() - 1]),
        }
    }
}

/// Nearest-rank percentile over sorted samples
fn percentile(sorted: &[Duration], p: u8) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((p as f64 / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn as_ms(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

/// Concurrent accumulator shared by every worker of a run.
///
/// Counts only grow. [`OutcomeAggregator::snapshot`] is meant to be called
/// once all workers have been joined.
#[derive(Debug, Default)]
pub struct OutcomeAggregator {
    accepted: AtomicU64,
    business_rejected: AtomicU64,
    lock_timeout_rejected: AtomicU64,
    transport_error: AtomicU64,
    latencies: Mutex<Vec<Duration>>,
}

impl OutcomeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&self, outcome: AttemptOutcome, latency: Duration) {
        let counter = match outcome {
            AttemptOutcome::Accepted => &self.accepted,
            AttemptOutcome::BusinessRejected => &self.business_rejected,
            AttemptOutcome::LockTimeoutRejected => &self.lock_timeout_rejected,
            AttemptOutcome::TransportError => &self.transport_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.latencies.lock().push(latency);
    }

    pub fn snapshot(&self) -> OutcomeTally {
        OutcomeTally {
            accepted: self.accepted.load(Ordering::Acquire),
            business_rejected: self.business_rejected.load(Ordering::Acquire),
            lock_timeout_rejected: self.lock_timeout_rejected.load(Ordering::Acquire),
            transport_error: self.transport_error.load(Ordering::Acquire),
        }
    }

    pub fn latency_stats(&self) -> LatencyStats {
        LatencyStats::from_samples(&self.latencies.lock())
    }
}
