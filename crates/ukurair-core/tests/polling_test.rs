#![allow(clippy::unwrap_used)]
// End-to-end tests of the REST binding through the controller, against a
// wiremock API.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ukurair_core::{
    Controller, CoreConfig, DeviceId, MSG_BAD_CREDENTIALS, PollIntervals, Screen, WaterStatus,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn config(server: &MockServer, session_path: Option<std::path::PathBuf>) -> CoreConfig {
    let mut config = CoreConfig::rest(Url::parse(&format!("{}/api", server.uri())).unwrap());
    config.intervals = PollIntervals {
        dashboard: Duration::from_millis(20),
        admin: Duration::from_millis(20),
        history: Duration::from_millis(20),
    };
    config.session_path = session_path;
    config
}

async fn mount_public(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "a", "name": "Gate A", "water_level": 42, "status": "SIAGA",
              "created_at": "2024-01-01T00:00:00Z" },
            { "id": "x", "name": "Gate X", "water_level": 7, "status": "AMAN",
              "created_at": "2024-01-01T00:00:00Z" }
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/devices/[^/]+/history$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "water_level": 30, "status": "SIAGA", "created_at": "2024-01-01T00:00:20Z" },
            { "water_level": 10, "status": "AMAN", "created_at": "2024-01-01T00:00:00Z" }
        ])))
        .mount(server)
        .await;
}

async fn mount_admin(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "jwt-token",
            "user": { "id": 1, "username": "admin" }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .and(header("authorization", "Bearer jwt-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "a", "name": "Gate A", "secret_key": "AAAA1111" },
            { "id": "x", "name": "Gate X", "secret_key": "XXXX9999" }
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "global_api_key": "GLOBAL" })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/admin/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_devices": 2,
            "total_measurements": 10,
            "status_counts": [
                { "status": "AMAN", "count": 7 },
                { "status": "SIAGA", "count": 2 },
                { "status": "DARURAT", "count": 1 }
            ]
        })))
        .mount(server)
        .await;
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..300 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

async fn signed_in(server: &MockServer, session_path: Option<std::path::PathBuf>) -> Controller {
    mount_public(server).await;
    mount_admin(server).await;
    let ctrl = Controller::from_config(&config(server, session_path)).unwrap();
    ctrl.start().await.unwrap();
    ctrl.request_admin().await;
    ctrl.login("admin", SecretString::from("secret".to_owned()))
        .await
        .unwrap();
    ctrl
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_dashboard_is_polled_into_the_store() {
    let server = MockServer::start().await;
    mount_public(&server).await;

    let ctrl = Controller::from_config(&config(&server, None)).unwrap();
    ctrl.start().await.unwrap();

    let store = Arc::clone(ctrl.store());
    eventually(|| {
        let store = Arc::clone(&store);
        async move { store.dashboard().len() == 2 }
    })
    .await;

    let gate = store.dashboard_entry(&DeviceId::from("a")).unwrap();
    assert_eq!(gate.name, "Gate A");
    assert!((gate.water_level_cm - 42.0).abs() < f64::EPSILON);
    assert_eq!(gate.status, WaterStatus::Watch);
    assert!(!ctrl.view().loading);
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_detail_history_is_ascending() {
    let server = MockServer::start().await;
    mount_public(&server).await;

    let ctrl = Controller::from_config(&config(&server, None)).unwrap();
    ctrl.start().await.unwrap();
    let store = Arc::clone(ctrl.store());
    eventually(|| {
        let store = Arc::clone(&store);
        async move { !store.dashboard().is_empty() }
    })
    .await;

    let a = DeviceId::from("a");
    ctrl.open_device(&a).await.unwrap();
    eventually(|| {
        let store = Arc::clone(&store);
        let a = a.clone();
        async move { store.history(&a).is_some() }
    })
    .await;

    let levels: Vec<f64> = store.history(&a).unwrap().iter().map(|m| m.water_level_cm).collect();
    assert_eq!(levels, vec![10.0, 30.0]);
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_wrong_password_shows_message() {
    let server = MockServer::start().await;
    mount_public(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid credentials" })))
        .mount(&server)
        .await;

    let ctrl = Controller::from_config(&config(&server, None)).unwrap();
    ctrl.start().await.unwrap();
    ctrl.request_admin().await;

    assert!(ctrl.login("admin", SecretString::from("wrong".to_owned())).await.is_err());
    let view = ctrl.view();
    assert_eq!(view.screen, Screen::Login);
    assert_eq!(view.error.as_deref(), Some(MSG_BAD_CREDENTIALS));
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_login_is_a_connection_failure() {
    let server = MockServer::start().await;
    mount_public(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let ctrl = Controller::from_config(&config(&server, None)).unwrap();
    ctrl.start().await.unwrap();
    ctrl.request_admin().await;

    assert!(ctrl.login("admin", SecretString::from("secret".to_owned())).await.is_err());
    assert_eq!(ctrl.view().error.as_deref(), Some("Koneksi gagal."));
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_admin_panel_loads_everything() {
    let server = MockServer::start().await;
    let ctrl = signed_in(&server, None).await;
    assert_eq!(ctrl.view().screen, Screen::Admin);

    let store = Arc::clone(ctrl.store());
    eventually(|| {
        let store = Arc::clone(&store);
        async move {
            store.devices().len() == 2 && store.histories().len() == 2 && store.stats().is_some()
        }
    })
    .await;

    assert_eq!(store.settings().unwrap().global_api_key, "GLOBAL");
    assert_eq!(store.stats().unwrap().alert_count(), 3);
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_deleted_device_disappears_everywhere() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/devices/x"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let ctrl = signed_in(&server, None).await;

    let store = Arc::clone(ctrl.store());
    let x = DeviceId::from("x");
    eventually(|| {
        let store = Arc::clone(&store);
        let x = x.clone();
        async move { store.device(&x).is_some() && store.dashboard_entry(&x).is_some() }
    })
    .await;

    ctrl.delete_device(&x).await.unwrap();

    // The mocks keep serving "x" (a read that raced the delete).
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(store.device(&x).is_none());
    assert!(store.dashboard_entry(&x).is_none());
    assert!(store.history(&x).is_none());
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_logout_clears_persisted_session() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let session_path = dir.path().join("session.json");

    let ctrl = signed_in(&server, Some(session_path.clone())).await;
    assert!(session_path.exists());

    ctrl.logout().await;
    assert!(!session_path.exists());
    assert_eq!(ctrl.view().screen, Screen::Dashboard);
    ctrl.shutdown().await;

    let restarted = Controller::from_config(&config(&server, Some(session_path))).unwrap();
    restarted.start().await.unwrap();
    assert!(!restarted.is_authenticated());
    restarted.shutdown().await;
}

#[tokio::test]
async fn test_rejected_token_forces_logout_to_dashboard() {
    let server = MockServer::start().await;
    mount_public(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "stale" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let ctrl = Controller::from_config(&config(&server, None)).unwrap();
    ctrl.start().await.unwrap();
    ctrl.request_admin().await;
    ctrl.login("admin", SecretString::from("secret".to_owned()))
        .await
        .unwrap();

    ctrl.subscribe_view()
        .wait_for(|v| v.screen == Screen::Dashboard)
        .await
        .unwrap();
    assert!(!ctrl.is_authenticated());
    ctrl.shutdown().await;
}
