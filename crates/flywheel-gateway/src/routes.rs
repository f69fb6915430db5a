//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{api, health, proxy};
use crate::state::GatewayState;

/// Prefix of the control API. Paths under it are never forwarded.
pub const CONTROL_PREFIX: &str = "/__flywheel";

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Control API
/// - `GET /__flywheel/health` - Gateway liveness
/// - `GET /__flywheel/status` - Current state (does not extend the session)
/// - `POST /__flywheel/start` - Start the resources
/// - `POST /__flywheel/stop` - Stop the resources
/// - `POST /__flywheel/timeout` - Schedule the idle shutdown (`{"seconds": N}`)
///
/// ## Everything else
/// Pings the authority, then forwards to the backend or answers with a page.
pub fn create_router(state: GatewayState) -> Router {
    // Extract config values before moving state
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let state = Arc::new(state);

    Router::new()
        .route(&format!("{CONTROL_PREFIX}/health"), get(health::health))
        .route(&format!("{CONTROL_PREFIX}/status"), get(api::status))
        .route(&format!("{CONTROL_PREFIX}/start"), post(api::start))
        .route(&format!("{CONTROL_PREFIX}/stop"), post(api::stop))
        .route(&format!("{CONTROL_PREFIX}/timeout"), post(api::set_timeout))
        .fallback(proxy::proxy)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body_bytes))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use chrono::Utc;
    use flywheel_control::resource_client::mock::CallKind;
    use flywheel_control::{
        health as control_health, ControlConfig, Flywheel, FlywheelHandle, HealthReport,
        InstanceId, MockResourceClient, ResourceError, State,
    };
    use serde_json::Value;
    use tokio::sync::mpsc;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::GatewayConfig;

    struct Harness {
        server: TestServer,
        handle: FlywheelHandle,
        mock: Arc<MockResourceClient>,
        health: mpsc::Sender<HealthReport>,
    }

    fn harness(endpoint: &str) -> Harness {
        let mock = Arc::new(MockResourceClient::new());
        let control = ControlConfig {
            instances: vec![InstanceId::new("i-1").unwrap()],
            ..ControlConfig::default()
        };
        let flywheel = Flywheel::new(Arc::clone(&mock), &control, Utc::now());
        let (health, health_rx) = control_health::channel();
        let (handle, _join) = flywheel.spawn(health_rx);

        let config = GatewayConfig {
            endpoint: endpoint.to_string(),
            ..GatewayConfig::default()
        };
        let state = GatewayState::new(handle.clone(), config).unwrap();
        let server = TestServer::new(create_router(state)).unwrap();

        Harness {
            server,
            handle,
            mock,
            health,
        }
    }

    /// Start the pool, report it ready and wait for the next tick.
    async fn started(h: &Harness) {
        h.handle.start().await.unwrap();
        h.health
            .send(HealthReport::Ready {
                phase: State::Starting,
                ready: true,
            })
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while h.handle.current_state() != State::Started {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn health_reports_published_state() {
        let h = harness("127.0.0.1:1");
        let response = h.server.get("/__flywheel/health").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["flywheel"], "STOPPED");
    }

    #[tokio::test]
    async fn status_endpoint_returns_pong() {
        let h = harness("127.0.0.1:1");
        let response = h.server.get("/__flywheel/status").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "STOPPED");
        assert!(body.get("stop-due-at").is_some());
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn start_endpoint_starts() {
        let h = harness("127.0.0.1:1");
        let response = h.server.post("/__flywheel/start").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "STARTING");
        assert!(body.get("last-started").is_some());
    }

    #[tokio::test]
    async fn failed_start_is_bad_gateway_with_pong() {
        let h = harness("127.0.0.1:1");
        h.mock.fail_on(
            CallKind::StartInstances,
            ResourceError::Request("connection refused".into()),
        );

        let response = h.server.post("/__flywheel/start").await;
        assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
        let body: Value = response.json();
        assert_eq!(body["status"], "STOPPED");
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("connection refused"));
    }

    #[tokio::test]
    async fn zero_timeout_is_rejected() {
        let h = harness("127.0.0.1:1");
        let response = h
            .server
            .post("/__flywheel/timeout")
            .json(&serde_json::json!({ "seconds": 0 }))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn stopped_pool_shows_start_prompt() {
        let h = harness("127.0.0.1:1");
        let response = h.server.get("/docs?page=2").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert!(response
            .text()
            .contains("href=\"/docs?page=2&amp;flywheel=start\""));
        assert!(h.mock.calls().is_empty());
    }

    #[tokio::test]
    async fn start_directive_starts_and_redirects() {
        let h = harness("127.0.0.1:1");
        let response = h.server.get("/docs?page=2&flywheel=start").await;

        assert_eq!(response.status_code(), StatusCode::FOUND);
        assert_eq!(response.header("location"), "/docs?page=2");
        assert_eq!(h.handle.current_state(), State::Starting);
    }

    #[tokio::test]
    async fn encoded_directive_is_honoured_and_stripped() {
        let h = harness("127.0.0.1:1");
        let response = h.server.get("/docs?page=2&fly%77heel=start").await;

        assert_eq!(response.status_code(), StatusCode::FOUND);
        assert_eq!(response.header("location"), "/docs?page=2");
        assert_eq!(h.handle.current_state(), State::Starting);
    }

    #[tokio::test]
    async fn other_directives_only_redirect() {
        let h = harness("127.0.0.1:1");
        let response = h.server.get("/?flywheel=whatever").await;

        assert_eq!(response.status_code(), StatusCode::FOUND);
        assert_eq!(response.header("location"), "/");
        assert_eq!(h.handle.current_state(), State::Stopped);
    }

    #[tokio::test]
    async fn starting_pool_shows_holding_page() {
        let h = harness("127.0.0.1:1");
        h.handle.start().await.unwrap();

        let response = h.server.get("/").await;
        assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.header("retry-after"), "5");
        assert!(response.text().contains("http-equiv=\"refresh\""));
    }

    #[tokio::test]
    async fn started_pool_forwards_to_backend() {
        let backend = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/items"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("x-backend", "yes")
                    .set_body_string("hello from backend"),
            )
            .expect(1)
            .mount(&backend)
            .await;

        let h = harness(&backend.address().to_string());
        started(&h).await;

        let response = h.server.get("/api/items?page=2").await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        assert_eq!(response.header("x-backend"), "yes");
        assert_eq!(response.text(), "hello from backend");
    }

    #[tokio::test]
    async fn forwarding_strips_hop_by_hop_headers() {
        let backend = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .and(header("x-request-id", "abc"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&backend)
            .await;

        let h = harness(&backend.address().to_string());
        started(&h).await;

        let response = h
            .server
            .post("/submit")
            .add_header(
                HeaderName::from_static("x-request-id"),
                HeaderValue::from_static("abc"),
            )
            .add_header(
                HeaderName::from_static("proxy-authorization"),
                HeaderValue::from_static("Basic c2VjcmV0"),
            )
            .text("payload")
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let received = backend.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(!received[0].headers.contains_key("proxy-authorization"));
        assert_eq!(received[0].body, b"payload");
    }

    #[tokio::test]
    async fn unreachable_backend_is_unavailable() {
        // Nothing listens on port 9 on loopback.
        let h = harness("127.0.0.1:9");
        started(&h).await;

        let response = h.server.get("/").await;
        assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "bad_gateway");
    }

    #[tokio::test]
    async fn missing_endpoint_is_server_error() {
        let h = harness("");
        started(&h).await;

        let response = h.server.get("/").await;
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.text().contains("invalid flywheel endpoint config"));
    }

    #[tokio::test]
    async fn gone_authority_is_unavailable() {
        let h = harness("127.0.0.1:1");
        h.handle.shutdown().await;
        // Wait until the loop has exited and dropped its queue.
        while h.handle.status().await.is_ok() {
            tokio::task::yield_now().await;
        }

        let response = h.server.get("/__flywheel/status").await;
        assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
