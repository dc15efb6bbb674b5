//! Inventory snapshots and the reader used by the baseline and final phases

use crate::error::ServiceError;
use crate::service::TicketService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Inventory state of one ticket at a point in time.
///
/// Signed so that a service which drove stock below zero is still readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSnapshot {
    pub stock: i64,
    pub reservation_count: i64,
}

impl TicketSnapshot {
    /// Substitute baseline when the initial read fails
    pub const ZERO: TicketSnapshot = TicketSnapshot {
        stock: 0,
        reservation_count: 0,
    };

    pub fn new(stock: i64, reservation_count: i64) -> Self {
        Self {
            stock,
            reservation_count,
        }
    }
}

/// Attached to the report when the baseline had to be replaced by zeros
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineWarning {
    pub error: String,
    pub message: String,
}

/// Result of the baseline phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineRead {
    pub snapshot: TicketSnapshot,
    pub warning: Option<BaselineWarning>,
}

/// Reads snapshots from the service. No retries.
#[derive(Clone)]
pub struct SnapshotReader {
    service: Arc<dyn TicketService>,
}

impl SnapshotReader {
    pub fn new(service: Arc<dyn TicketService>) -> Self {
        Self { service }
    }

    pub async fn read(&self, ticket_id: u64) -> Result<TicketSnapshot, ServiceError> {
        let snapshot = self.service.fetch_snapshot(ticket_id).await?;
        debug!(
            ticket_id,
            stock = snapshot.stock,
            reservation_count = snapshot.reservation_count,
            "Read ticket snapshot"
        );
        Ok(snapshot)
    }

    /// Read the baseline, degrading to [`TicketSnapshot::ZERO`] on failure.
    ///
    /// The run proceeds either way; the warning travels with the report.
    pub async fn read_baseline(&self, ticket_id: u64) -> BaselineRead {
        match self.read(ticket_id).await {
            Ok(snapshot) => BaselineRead {
                snapshot,
                warning: None,
            },
            Err(e) => {
                warn!(ticket_id, error = %e, "Baseline read failed, continuing with a zero baseline");
                BaselineRead {
                    snapshot: TicketSnapshot::ZERO,
                    warning: Some(BaselineWarning {
                        error: e.to_string(),
                        message: "baseline read failed; verification compares against stock=0, reservationCount=0".to_string(),
                    }),
                }
            }
        }
    }
}
