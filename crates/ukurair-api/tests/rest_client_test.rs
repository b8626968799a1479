#![allow(clippy::unwrap_used)]
// Integration tests for `RestClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ukurair_api::{Error, RestClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RestClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let client = RestClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

async fn setup_authenticated() -> (MockServer, RestClient) {
    let (server, client) = setup().await;
    client.set_token(SecretString::from("jwt-token".to_owned()));
    (server, client)
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn test_login_success_stores_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "username": "admin", "password": "hunter2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "jwt-token",
            "user": { "id": 1, "username": "admin" }
        })))
        .mount(&server)
        .await;

    let secret = SecretString::from("hunter2".to_owned());
    let login = client.login("admin", &secret).await.unwrap();

    assert_eq!(login.user.username.as_deref(), Some("admin"));
    assert!(client.has_token());
}

#[tokio::test]
async fn test_login_wrong_password() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid credentials" })),
        )
        .mount(&server)
        .await;

    let secret = SecretString::from("wrong".to_owned());
    let result = client.login("admin", &secret).await;

    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(!client.has_token());
}

#[tokio::test]
async fn test_login_without_token_is_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "user": null })))
        .mount(&server)
        .await;

    let secret = SecretString::from("pw".to_owned());
    let result = client.login("admin", &secret).await;
    assert!(matches!(result, Err(Error::Authentication { .. })));
}

#[tokio::test]
async fn test_login_server_error_is_not_auth_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let secret = SecretString::from("pw".to_owned());
    let result = client.login("admin", &secret).await;
    assert!(matches!(result, Err(Error::Api { status: 500, .. })));
}

// ── Public reads ────────────────────────────────────────────────────

#[tokio::test]
async fn test_dashboard() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "a",
            "name": "Gate A",
            "water_level": 42,
            "status": "SIAGA",
            "created_at": "2024-01-01T00:00:00Z"
        }])))
        .mount(&server)
        .await;

    let rows = client.dashboard().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "a");
    assert_eq!(rows[0].status.as_deref(), Some("SIAGA"));
    assert!((rows[0].water_level - 42.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_device_history_is_public_and_escaped() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices/7/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 2, "device_id": 7, "water_level": "12.5", "status": "AMAN",
              "created_at": "2024-01-01 00:00:10" },
            { "id": 1, "device_id": 7, "water_level": 11, "status": "AMAN",
              "created_at": "2024-01-01 00:00:00" }
        ])))
        .mount(&server)
        .await;

    let history = client.device_history("7").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id.as_deref(), Some("2"));
}

#[tokio::test]
async fn test_dashboard_bad_json() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = client.dashboard().await;
    assert!(matches!(result, Err(Error::Deserialization { .. })));
}

// ── Authenticated reads ─────────────────────────────────────────────

#[tokio::test]
async fn test_devices_sends_bearer() {
    let (server, client) = setup_authenticated().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .and(header("authorization", "Bearer jwt-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "name": "Gate A", "secret_key": "ABCD1234", "created_at": "2024-01-01T00:00:00Z" }
        ])))
        .mount(&server)
        .await;

    let devices = client.devices().await.unwrap();
    assert_eq!(devices[0].secret_key.as_deref(), Some("ABCD1234"));
}

#[tokio::test]
async fn test_expired_token_maps_to_session_expired() {
    let (server, client) = setup_authenticated().await;

    for route in ["/api/settings", "/api/admin/stats"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
    }

    assert!(matches!(client.settings().await, Err(Error::SessionExpired)));
    assert!(matches!(client.admin_stats().await, Err(Error::SessionExpired)));
}

#[tokio::test]
async fn test_authenticated_call_without_token() {
    let (_server, client) = setup().await;
    let result = client.devices().await;
    assert!(matches!(result, Err(Error::SessionExpired)));
}

#[tokio::test]
async fn test_admin_stats() {
    let (server, client) = setup_authenticated().await;

    Mock::given(method("GET"))
        .and(path("/api/admin/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_devices": "3",
            "total_measurements": "1500",
            "status_counts": [
                { "status": "AMAN", "count": "1400" },
                { "status": "SIAGA", "count": "90" },
                { "status": "DARURAT", "count": "10" }
            ]
        })))
        .mount(&server)
        .await;

    let stats = client.admin_stats().await.unwrap();
    assert_eq!(stats.total_devices, 3);
    assert_eq!(stats.status_counts.len(), 3);
}

// ── Mutations ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_device() {
    let (server, client) = setup_authenticated().await;

    Mock::given(method("POST"))
        .and(path("/api/devices"))
        .and(body_json(json!({ "name": "Gate B", "secret_key": "Q1W2E3R4" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    client.create_device("Gate B", "Q1W2E3R4").await.unwrap();
}

#[tokio::test]
async fn test_delete_device() {
    let (server, client) = setup_authenticated().await;

    Mock::given(method("DELETE"))
        .and(path("/api/devices/x"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client.delete_device("x").await.unwrap();
}

#[tokio::test]
async fn test_update_token_and_settings() {
    let (server, client) = setup_authenticated().await;

    Mock::given(method("PATCH"))
        .and(path("/api/devices/x"))
        .and(body_json(json!({ "secret_key": "NEWTOKEN" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/settings"))
        .and(body_json(json!({ "global_api_key": "global-1" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.update_device_token("x", "NEWTOKEN").await.unwrap();
    client.update_settings("global-1").await.unwrap();
}

#[tokio::test]
async fn test_mutation_error_carries_message() {
    let (server, client) = setup_authenticated().await;

    Mock::given(method("DELETE"))
        .and(path("/api/devices/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "Device not found" })),
        )
        .mount(&server)
        .await;

    let err = client.delete_device("missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("Device not found"));
}
