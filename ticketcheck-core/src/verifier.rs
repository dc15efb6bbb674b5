//! Consistency verification
//!
//! Compares the baseline and final snapshots of a run. Three invariants are
//! checked, each independently of the others:
//!
//! 1. `reservation_delta <= baseline.stock` (no overbooking)
//! 2. `stock_delta == reservation_delta` (every reservation moved stock by one)
//! 3. `final.stock >= 0`
//!
//! When several fail at once the summary names the most specific failure,
//! in the order overbooking, race condition, negative stock. The booleans
//! are always all present.

use crate::snapshot::TicketSnapshot;
use crate::tally::OutcomeTally;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dominant verdict of a verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Consistent,
    Overbooked,
    RaceCondition,
    NegativeStock,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Consistent => "consistent",
            Verdict::Overbooked => "overbooked",
            Verdict::RaceCondition => "race_condition",
            Verdict::NegativeStock => "negative_stock",
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            Verdict::Consistent => "Inventory is consistent: no overbooking, stock and reservations moved together",
            Verdict::Overbooked => "Overbooking: more reservations were created than stock existed at baseline",
            Verdict::RaceCondition => "Race condition: stock decrease does not match the reservation increase",
            Verdict::NegativeStock => "Negative stock: final stock is below zero",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of comparing a run's snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub overbooked: bool,
    pub race_condition_detected: bool,
    pub negative_stock: bool,
    /// `baseline.stock - final.stock`
    pub stock_delta: i64,
    /// `final.reservation_count - baseline.reservation_count`
    pub reservation_delta: i64,
    /// Accepted attempts minus recorded reservations. Informational: queued
    /// backends may accept requests they later reject.
    pub unapplied_acceptances: i64,
    pub verdict: Verdict,
}

impl VerificationReport {
    pub fn is_consistent(&self) -> bool {
        !(self.overbooked || self.race_condition_detected || self.negative_stock)
    }
}

/// Verify a run. Pure: the same inputs always give the same report.
///
/// Deltas are computed in `i128` so extreme snapshot values cannot wrap and
/// flip a verdict. The reported deltas saturate at the `i64` bounds.
pub fn verify(
    baseline: &TicketSnapshot,
    final_snapshot: &TicketSnapshot,
    tally: &OutcomeTally,
) -> VerificationReport {
    let reservation_delta =
        i128::from(final_snapshot.reservation_count) - i128::from(baseline.reservation_count);
    let stock_delta = i128::from(baseline.stock) - i128::from(final_snapshot.stock);

    let overbooked = reservation_delta > i128::from(baseline.stock);
    let race_condition_detected = stock_delta != reservation_delta;
    let negative_stock = final_snapshot.stock < 0;

    let verdict = if overbooked {
        Verdict::Overbooked
    } else if race_condition_detected {
        Verdict::RaceCondition
    } else if negative_stock {
        Verdict::NegativeStock
    } else {
        Verdict::Consistent
    };

    VerificationReport {
        overbooked,
        race_condition_detected,
        negative_stock,
        stock_delta: saturate(stock_delta),
        reservation_delta: saturate(reservation_delta),
        unapplied_acceptances: saturate(i128::from(tally.accepted) - reservation_delta),
        verdict,
    }
}

fn saturate(value: i128) -> i64 {
    value.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}
