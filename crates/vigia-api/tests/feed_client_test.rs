#![allow(clippy::unwrap_used)]
// Integration tests for `FeedClient` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vigia_api::{AlertSeverity, Error, FeedClient, SirenStatus, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

const FEED_PATH: &str = "/v1/operational";

async fn setup() -> (MockServer, FeedClient) {
    let server = MockServer::start().await;
    let endpoint = Url::parse(&format!("{}{FEED_PATH}", server.uri())).unwrap();
    let client = FeedClient::with_client(reqwest::Client::new(), endpoint);
    (server, client)
}

fn sample_feed() -> serde_json::Value {
    json!({
        "alerts": [{
            "id": "alt-1",
            "title": "Heavy rain expected",
            "severity": "warning",
            "area": "Zona Norte",
            "issued_at": "2026-01-10T12:00:00Z"
        }],
        "sirens": [{
            "id": "sir-9",
            "name": "Morro do Borel",
            "location": { "lat": -22.94, "lon": -43.25 },
            "status": "active"
        }],
        "weather_stations": [{
            "id": "ws-3",
            "name": "Tijuca",
            "location": { "lat": -22.93, "lon": -43.22 },
            "rain_1h_mm": 12.4
        }],
        "stage": 3,
        "heat_level": 2
    })
}

// ── Success ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_dataset() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_feed()))
        .mount(&server)
        .await;

    let ds = client.fetch_dataset().await.unwrap();

    assert_eq!(ds.alerts.len(), 1);
    assert_eq!(ds.alerts[0].severity, AlertSeverity::Warning);
    assert_eq!(ds.sirens[0].status, SirenStatus::Active);
    assert_eq!(ds.weather_stations[0].rain_1h_mm, Some(12.4));
    assert_eq!(ds.stage, Some(3));
    assert_eq!(ds.heat_level, Some(2));
    assert!(ds.cameras.is_empty());
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;
    let endpoint = Url::parse(&format!("{}{FEED_PATH}", server.uri())).unwrap();
    let transport =
        TransportConfig::default().with_auth_token("feed-token".to_string().into());
    let client = FeedClient::new(endpoint, &transport).unwrap();

    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .and(header("authorization", "Bearer feed-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_feed()))
        .expect(1)
        .mount(&server)
        .await;

    client.fetch_dataset().await.unwrap();
}

// ── HTTP failures ───────────────────────────────────────────────────

#[tokio::test]
async fn test_server_error_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client.fetch_dataset().await.unwrap_err();
    assert!(
        matches!(err, Error::Status { status: 503, ref body_preview } if body_preview == "maintenance"),
        "expected 503 status error, got: {err:?}"
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_gateway_timeout_is_timeout() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(504))
        .mount(&server)
        .await;

    let err = client.fetch_dataset().await.unwrap_err();
    assert!(err.is_timeout());
}

// ── Payload failures ────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = client.fetch_dataset().await.unwrap_err();
    assert!(matches!(err, Error::EmptyBody), "got: {err:?}");
}

#[tokio::test]
async fn test_malformed_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client.fetch_dataset().await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }), "got: {err:?}");
    assert!(err.is_payload());
}

// ── Transport failures ──────────────────────────────────────────────

#[tokio::test]
async fn test_outer_deadline() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(sample_feed())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let err = client
        .fetch_dataset_within(Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { timeout_ms: 100 }), "got: {err:?}");
}

#[tokio::test]
async fn test_connection_refused() {
    // Bind then drop to obtain a port with nothing listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let endpoint = Url::parse(&format!("http://{addr}{FEED_PATH}")).unwrap();
    let client = FeedClient::with_client(reqwest::Client::new(), endpoint);

    let err = client.fetch_dataset().await.unwrap_err();
    assert!(err.is_connect(), "expected connect error, got: {err:?}");
}
