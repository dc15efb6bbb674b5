//! Settling wait between the end of load and the final snapshot

use crate::snapshot::{SnapshotReader, TicketSnapshot};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use ticketcheck_config::{SettleConfig, SettleMode, StrategyId};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// How long to wait before the final read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum SettlePolicy {
    None,
    Fixed {
        #[serde(with = "humantime_serde")]
        wait: Duration,
    },
    /// Re-read every `interval` until `stable_reads` consecutive identical
    /// snapshots are seen, giving up after `max_wait`
    PollUntilStable {
        #[serde(with = "humantime_serde")]
        interval: Duration,
        #[serde(with = "humantime_serde")]
        max_wait: Duration,
        stable_reads: u32,
    },
}

/// What the settling phase did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleOutcome {
    #[serde(with = "humantime_serde")]
    pub waited: Duration,
    /// Snapshot reads issued while polling
    pub reads: u32,
    /// False when polling gave up before the snapshot stopped changing
    pub stable: bool,
}

impl SettlePolicy {
    /// Policy for `strategy` under the given settings
    pub fn from_config(config: &SettleConfig, strategy: StrategyId) -> Self {
        match config.mode {
            SettleMode::None => SettlePolicy::None,
            SettleMode::PollUntilStable => SettlePolicy::PollUntilStable {
                interval: config.poll_interval,
                max_wait: config.max_wait,
                stable_reads: config.stable_reads.max(1),
            },
            SettleMode::StrategyDefault | SettleMode::Fixed => {
                let wait = config.fixed_wait_for(strategy);
                if wait.is_zero() {
                    SettlePolicy::None
                } else {
                    SettlePolicy::Fixed { wait }
                }
            }
        }
    }

    pub async fn settle(&self, reader: &SnapshotReader, ticket_id: u64) -> SettleOutcome {
        let started = Instant::now();

        match *self {
            SettlePolicy::None => SettleOutcome {
                waited: Duration::ZERO,
                reads: 0,
                stable: true,
            },
            SettlePolicy::Fixed { wait } => {
                info!(wait = ?wait, "Waiting for asynchronous processing to settle");
                sleep(wait).await;
                SettleOutcome {
                    waited: started.elapsed(),
                    reads: 0,
                    stable: true,
                }
            }
            SettlePolicy::PollUntilStable {
                interval,
                max_wait,
                stable_reads,
            } => {
                let deadline = started + max_wait;
                let mut last: Option<TicketSnapshot> = None;
                let mut identical = 0u32;
                let mut reads = 0u32;

                loop {
                    reads += 1;
                    match reader.read(ticket_id).await {
                        Ok(snapshot) if Some(snapshot) == last => identical += 1,
                        Ok(snapshot) => {
                            last = Some(snapshot);
                            identical = 1;
                        }
                        Err(e) => {
                            debug!(error = %e, "Snapshot read failed while settling");
                            last = None;
                            identical = 0;
                        }
                    }

                    if identical >= stable_reads {
                        info!(reads, waited = ?started.elapsed(), "Snapshot settled");
                        return SettleOutcome {
                            waited: started.elapsed(),
                            reads,
                            stable: true,
                        };
                    }

                    if Instant::now() + interval > deadline {
                        warn!(reads, max_wait = ?max_wait, "Snapshot still changing at max wait");
                        return SettleOutcome {
                            waited: started.elapsed(),
                            reads,
                            stable: false,
                        };
                    }
                    sleep(interval).await;
                }
            }
        }
    }
}
