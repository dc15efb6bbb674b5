//! reqwest implementation of the reservation service

use crate::config::HttpClientConfig;
use crate::errors::HttpError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use ticketcheck_core::{
    HttpMethod, RequestTemplate, ReservationResponse, Router, ServiceError, TicketService,
    TicketSnapshot,
};
use tracing::{debug, trace};
use url::Url;

/// Talks to the reservation service over HTTP.
///
/// One pooled client is shared by every worker of a run.
#[derive(Debug, Clone)]
pub struct HttpTicketService {
    client: Client,
    base_url: String,
}

impl HttpTicketService {
    /// Create a client for the service at `base_url`
    pub fn new(base_url: &str, config: HttpClientConfig) -> Result<Self, HttpError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| HttpError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(HttpError::InvalidUrl(format!(
                "{}: scheme must be http or https",
                base_url
            )));
        }

        debug!(
            base_url,
            timeout = ?config.timeout,
            "Creating reservation service client"
        );
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Paths are appended so a base URL with a path prefix keeps it
    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| ServiceError::UnreachableService(format!("invalid endpoint {}: {}", path, e)))
    }
}

fn unreachable(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::UnreachableService(format!("request timed out: {}", err))
    } else {
        ServiceError::UnreachableService(err.to_string())
    }
}

#[async_trait]
impl TicketService for HttpTicketService {
    async fn fetch_snapshot(&self, ticket_id: u64) -> Result<TicketSnapshot, ServiceError> {
        let url = self.endpoint(&Router::snapshot_path(ticket_id))?;
        debug!(%url, "Reading ticket snapshot");

        let response = self.client.get(url).send().await.map_err(unreachable)?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ServiceError::UnexpectedStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(unreachable)?;
        serde_json::from_str(&body).map_err(|e| ServiceError::MalformedResponse(e.to_string()))
    }

    async fn reserve(
        &self,
        ticket_id: u64,
        template: &RequestTemplate,
        user_id: &str,
    ) -> Result<ReservationResponse, ServiceError> {
        let url = self.endpoint(&template.path_for(ticket_id))?;
        let method = match template.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let response = self
            .client
            .request(method, url)
            .query(&template.query_for(user_id))
            .send()
            .await
            .map_err(unreachable)?;

        // The status already decided the outcome; a body that fails to
        // arrive only loses the rejection detail
        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(user_id, status, error = %e, "Reservation body unreadable");
                String::new()
            }
        };
        trace!(user_id, status, "Reservation response");

        Ok(ReservationResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use ticketcheck_core::StrategyId;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer) -> HttpTicketService {
        HttpTicketService::new(&server.uri(), HttpClientConfig::default()).unwrap()
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(matches!(
            HttpTicketService::new("not a url", HttpClientConfig::default()),
            Err(HttpError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpTicketService::new("ftp://tickets", HttpClientConfig::default()),
            Err(HttpError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tickets/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 1,
                "name": "Concert",
                "stock": 100,
                "reservationCount": 0
            })))
            .mount(&server)
            .await;

        let snapshot = service(&server).fetch_snapshot(1).await.unwrap();
        assert_eq!(snapshot, TicketSnapshot::new(100, 0));
    }

    #[tokio::test]
    async fn test_fetch_snapshot_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tickets/404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tickets/2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = service(&server);
        assert_eq!(
            client.fetch_snapshot(404).await,
            Err(ServiceError::UnexpectedStatus(404))
        );
        assert!(matches!(
            client.fetch_snapshot(2).await,
            Err(ServiceError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        // Bind and release a port so nothing is listening on it
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = HttpTicketService::new(
            &format!("http://127.0.0.1:{}", port),
            HttpClientConfig::default(),
        )
        .unwrap();
        assert!(matches!(
            client.fetch_snapshot(1).await,
            Err(ServiceError::UnreachableService(_))
        ));
    }

    #[tokio::test]
    async fn test_reserve_sends_user_id_to_routed_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/tickets/3/reserve/pessimistic"))
            .and(query_param("userId", "user_4_2"))
            .respond_with(ResponseTemplate::new(400).set_body_string("재고가 부족합니다"))
            .expect(1)
            .mount(&server)
            .await;

        let response = service(&server)
            .reserve(3, &Router::route(StrategyId::RowLock), "user_4_2")
            .await
            .unwrap();
        assert_eq!(response, ReservationResponse::new(400, "재고가 부족합니다"));
    }

    #[tokio::test]
    async fn test_reserve_timeout_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let config = HttpClientConfig {
            timeout: Duration::from_millis(50),
            ..HttpClientConfig::default()
        };
        let client = HttpTicketService::new(&server.uri(), config).unwrap();
        let result = client
            .reserve(1, &Router::route(StrategyId::QueuedAsync), "user_1_0")
            .await;
        assert!(matches!(result, Err(ServiceError::UnreachableService(_))));
    }

    #[tokio::test]
    async fn test_truncated_body_keeps_status() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Promise more body than is sent, then hang up
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 64\r\n\r\nreserv")
                .await
                .unwrap();
        });

        let client =
            HttpTicketService::new(&format!("http://{}", addr), HttpClientConfig::default())
                .unwrap();
        let response = client
            .reserve(1, &Router::route(StrategyId::OptimisticLock), "user_1_0")
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_base_url_prefix_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ticketing/api/tickets/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"stock":1,"reservationCount":2}"#),
            )
            .mount(&server)
            .await;

        let client = HttpTicketService::new(
            &format!("{}/ticketing/", server.uri()),
            HttpClientConfig::default(),
        )
        .unwrap();
        assert_eq!(client.base_url(), format!("{}/ticketing", server.uri()));
        assert_eq!(
            client.fetch_snapshot(1).await.unwrap(),
            TicketSnapshot::new(1, 2)
        );
    }
}
