//! Reservation worker: one attempt, one classified outcome

use crate::error::ServiceError;
use crate::router::RequestTemplate;
use crate::service::{ReservationResponse, TicketService};
use crate::tally::OutcomeAggregator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Classified result of a single reservation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// HTTP 200
    Accepted,
    /// HTTP 400: sold out, duplicate reservation and similar
    BusinessRejected,
    /// HTTP 400 whose body carries the lock-timeout marker
    LockTimeoutRejected,
    /// Any other status, or the request did not complete
    TransportError,
}

impl AttemptOutcome {
    pub const ALL: [AttemptOutcome; 4] = [
        AttemptOutcome::Accepted,
        AttemptOutcome::BusinessRejected,
        AttemptOutcome::LockTimeoutRejected,
        AttemptOutcome::TransportError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Accepted => "accepted",
            AttemptOutcome::BusinessRejected => "business_rejected",
            AttemptOutcome::LockTimeoutRejected => "lock_timeout_rejected",
            AttemptOutcome::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synthetic user identity for an attempt.
///
/// Worker indices are 1-based and never reused within a run; iteration
/// indices are 0-based per worker, so identities never collide.
pub fn user_identity(worker_index: u64, iteration_index: u64) -> String {
    format!("user_{}_{}", worker_index, iteration_index)
}

/// Map a raw service answer onto an [`AttemptOutcome`]
pub fn classify(
    result: &Result<ReservationResponse, ServiceError>,
    lock_timeout_marker: &str,
) -> AttemptOutcome {
    match result {
        Ok(response) => match response.status {
            200 => AttemptOutcome::Accepted,
            400 if !lock_timeout_marker.is_empty()
                && response.body.contains(lock_timeout_marker) =>
            {
                AttemptOutcome::LockTimeoutRejected
            }
            400 => AttemptOutcome::BusinessRejected,
            _ => AttemptOutcome::TransportError,
        },
        Err(_) => AttemptOutcome::TransportError,
    }
}

/// Issues reservation attempts and folds each outcome into the aggregator.
///
/// Cheap to clone; every scheduled worker task holds its own copy.
#[derive(Clone)]
pub struct ReservationWorker {
    service: Arc<dyn TicketService>,
    ticket_id: u64,
    template: Arc<RequestTemplate>,
    lock_timeout_marker: Arc<str>,
    aggregator: Arc<OutcomeAggregator>,
}

impl ReservationWorker {
    pub fn new(
        service: Arc<dyn TicketService>,
        ticket_id: u64,
        template: RequestTemplate,
        lock_timeout_marker: &str,
        aggregator: Arc<OutcomeAggregator>,
    ) -> Self {
        Self {
            service,
            ticket_id,
            template: Arc::new(template),
            lock_timeout_marker: Arc::from(lock_timeout_marker),
            aggregator,
        }
    }

    pub fn aggregator(&self) -> &Arc<OutcomeAggregator> {
        &self.aggregator
    }

    /// One reservation attempt. Never retried.
    pub async fn attempt(&self, worker_index: u64, iteration_index: u64) -> AttemptOutcome {
        let user_id = user_identity(worker_index, iteration_index);
        let started = Instant::now();

        let result = self
            .service
            .reserve(self.ticket_id, &self.template, &user_id)
            .await;
        let latency = started.elapsed();

        let outcome = classify(&result, &self.lock_timeout_marker);
        match &result {
            Ok(response) => trace!(
                worker = worker_index,
                user_id = %user_id,
                status = response.status,
                outcome = %outcome,
                "Reservation attempt finished"
            ),
            Err(e) => debug!(
                worker = worker_index,
                user_id = %user_id,
                error = %e,
                "Reservation attempt did not complete"
            ),
        }

        self.aggregator.fold(outcome, latency);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Router;
    use crate::testing::{SimulatedTicketService, SimulationMode};
    use ticketcheck_config::{StrategyId, DEFAULT_LOCK_TIMEOUT_MARKER};

    fn response(status: u16, body: &str) -> Result<ReservationResponse, ServiceError> {
        Ok(ReservationResponse::new(status, body))
    }

    #[test]
    fn test_classification_table() {
        let marker = DEFAULT_LOCK_TIMEOUT_MARKER;

        assert_eq!(classify(&response(200, ""), marker), AttemptOutcome::Accepted);
        assert_eq!(
            classify(&response(400, "예매 처리 중입니다"), marker),
            AttemptOutcome::LockTimeoutRejected
        );
        assert_eq!(
            classify(&response(400, "재고가 부족합니다"), marker),
            AttemptOutcome::BusinessRejected
        );
        assert_eq!(
            classify(&response(500, "Internal Server Error"), marker),
            AttemptOutcome::TransportError
        );
        assert_eq!(
            classify(
                &Err(ServiceError::UnreachableService("timed out".into())),
                marker
            ),
            AttemptOutcome::TransportError
        );
    }

    #[test]
    fn test_marker_only_refines_400() {
        let marker = DEFAULT_LOCK_TIMEOUT_MARKER;
        assert_eq!(
            classify(&response(409, "예매 처리 중입니다"), marker),
            AttemptOutcome::TransportError
        );
        assert_eq!(
            classify(&response(200, "예매 처리 중입니다"), marker),
            AttemptOutcome::Accepted
        );
        // Marker embedded in a JSON error body still matches
        assert_eq!(
            classify(
                &response(400, r#"{"message":"예매 처리 중입니다. 잠시 후 다시 시도해주세요"}"#),
                marker
            ),
            AttemptOutcome::LockTimeoutRejected
        );
    }

    #[test]
    fn test_user_identity() {
        assert_eq!(user_identity(1, 0), "user_1_0");
        assert_eq!(user_identity(100, 9), "user_100_9");
        assert_ne!(user_identity(1, 11), user_identity(11, 1));
    }

    #[tokio::test]
    async fn test_attempt_folds_exactly_once() {
        let service = Arc::new(SimulatedTicketService::new(1, SimulationMode::Correct));
        let aggregator = Arc::new(OutcomeAggregator::new());
        let worker = ReservationWorker::new(
            service.clone(),
            1,
            Router::route(StrategyId::RowLock),
            DEFAULT_LOCK_TIMEOUT_MARKER,
            aggregator.clone(),
        );

        assert_eq!(worker.attempt(1, 0).await, AttemptOutcome::Accepted);
        assert_eq!(worker.attempt(2, 0).await, AttemptOutcome::BusinessRejected);

        let tally = aggregator.snapshot();
        assert_eq!(tally.accepted, 1);
        assert_eq!(tally.business_rejected, 1);
        assert_eq!(service.users_seen(), vec!["user_1_0", "user_2_0"]);
    }
}
