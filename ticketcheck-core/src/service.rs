//! The reservation service as seen by the harness

use crate::error::ServiceError;
use crate::router::RequestTemplate;
use crate::snapshot::TicketSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Raw answer to a reservation attempt, before classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationResponse {
    pub status: u16,
    pub body: String,
}

impl ReservationResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Black-box access to the external reservation service.
///
/// Implementations must be shareable across every worker of a run.
#[async_trait]
pub trait TicketService: Send + Sync {
    /// Read the authoritative inventory state of a ticket
    async fn fetch_snapshot(&self, ticket_id: u64) -> Result<TicketSnapshot, ServiceError>;

    /// Issue one reservation attempt through the routed endpoint.
    ///
    /// Any HTTP status is a successful call; only a request that did not
    /// complete is an error.
    async fn reserve(
        &self,
        ticket_id: u64,
        template: &RequestTemplate,
        user_id: &str,
    ) -> Result<ReservationResponse, ServiceError>;
}
