//! Strategy to endpoint mapping

use serde::{Deserialize, Serialize};
use std::fmt;
use ticketcheck_config::StrategyId;

/// Placeholder in [`RequestTemplate::path`] replaced by the ticket id
pub const TICKET_ID_PLACEHOLDER: &str = "{ticketId}";

/// Query parameter carrying the synthetic user identity
pub const USER_ID_PARAM: &str = "userId";

/// HTTP methods used against the reservation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shape of a reservation request for one strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTemplate {
    /// Path with a `{ticketId}` placeholder
    pub path: String,
    pub method: HttpMethod,
    /// Names of the query parameters bound to the attempt's user identity
    pub query_params: Vec<String>,
}

impl RequestTemplate {
    /// Concrete path for a ticket
    pub fn path_for(&self, ticket_id: u64) -> String {
        self.path
            .replace(TICKET_ID_PLACEHOLDER, &ticket_id.to_string())
    }

    /// Query pairs for one attempt
    pub fn query_for(&self, user_id: &str) -> Vec<(String, String)> {
        self.query_params
            .iter()
            .map(|name| (name.clone(), user_id.to_string()))
            .collect()
    }
}

/// Maps a resolved strategy onto its reservation endpoint.
///
/// Unknown identifiers never reach the router: they are resolved to the
/// fallback strategy when the run is configured.
pub struct Router;

impl Router {
    pub fn route(strategy: StrategyId) -> RequestTemplate {
        let suffix = Self::suffix(strategy)
            .map(|s| format!("/{}", s))
            .unwrap_or_default();

        RequestTemplate {
            path: format!("/api/tickets/{}/reserve{}", TICKET_ID_PLACEHOLDER, suffix),
            method: HttpMethod::Post,
            query_params: vec![USER_ID_PARAM.to_string()],
        }
    }

    /// Path segment appended to `/reserve`. The distributed-lock and queued
    /// backends are deployed as separate services on the bare route.
    pub fn suffix(strategy: StrategyId) -> Option<&'static str> {
        match strategy {
            StrategyId::InProcessLock => Some("synchronized"),
            StrategyId::RowLock => Some("pessimistic"),
            StrategyId::OptimisticLock => Some("optimistic"),
            StrategyId::DistributedLock | StrategyId::QueuedAsync => None,
        }
    }

    /// Snapshot endpoint for a ticket
    pub fn snapshot_path(ticket_id: u64) -> String {
        format!("/api/tickets/{}", ticket_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_per_strategy() {
        let cases = [
            (StrategyId::InProcessLock, "/api/tickets/7/reserve/synchronized"),
            (StrategyId::RowLock, "/api/tickets/7/reserve/pessimistic"),
            (StrategyId::OptimisticLock, "/api/tickets/7/reserve/optimistic"),
            (StrategyId::DistributedLock, "/api/tickets/7/reserve"),
            (StrategyId::QueuedAsync, "/api/tickets/7/reserve"),
        ];

        for (strategy, path) in cases {
            let template = Router::route(strategy);
            assert_eq!(template.method, HttpMethod::Post);
            assert_eq!(template.path_for(7), path, "{strategy}");
        }
    }

    #[test]
    fn test_query_binds_user_id() {
        let template = Router::route(StrategyId::RowLock);
        assert_eq!(
            template.query_for("user_3_0"),
            vec![("userId".to_string(), "user_3_0".to_string())]
        );
    }

    #[test]
    fn test_route_is_pure() {
        assert_eq!(
            Router::route(StrategyId::QueuedAsync),
            Router::route(StrategyId::QueuedAsync)
        );
        assert_eq!(Router::snapshot_path(42), "/api/tickets/42");
    }
}
