//! Core harness for ticketcheck
//!
//! A run has three phases: a baseline [`TicketSnapshot`], concurrent
//! reservation load shaped by a [`LoadProfile`], and a consistency check of
//! the final snapshot against the baseline and the [`OutcomeTally`]. The
//! reservation service itself is reached through the [`TicketService`] trait.

pub mod error;
pub mod harness;
pub mod profile;
pub mod report;
pub mod router;
pub mod scheduler;
pub mod service;
pub mod settle;
pub mod snapshot;
pub mod tally;
pub mod verifier;
pub mod worker;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types at the crate root
pub use error::{HarnessError, Result, ServiceError};
pub use harness::{Harness, HarnessSettings};
pub use profile::{LoadProfile, Stage, ThresholdReport, Thresholds};
pub use report::{RunOutcome, RunReport};
pub use router::{HttpMethod, RequestTemplate, Router};
pub use scheduler::{LoadSummary, Scheduler};
pub use service::{ReservationResponse, TicketService};
pub use settle::{SettleOutcome, SettlePolicy};
pub use snapshot::{BaselineRead, BaselineWarning, SnapshotReader, TicketSnapshot};
pub use tally::{LatencyStats, OutcomeAggregator, OutcomeTally};
pub use verifier::{verify, Verdict, VerificationReport};
pub use worker::{classify, user_identity, AttemptOutcome, ReservationWorker};

// The strategy tag is part of the configuration surface
pub use ticketcheck_config::StrategyId;
