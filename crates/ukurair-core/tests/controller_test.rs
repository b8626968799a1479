#![allow(clippy::unwrap_used)]
// Controller state-machine tests against an in-memory data source.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ukurair_core::{
    AdminStats, BackendKind, Controller, CoreError, Credentials, DashboardEntry, DataSource, Device,
    DeviceId, FeedData, FeedSink, Measurement, MSG_BAD_CREDENTIALS, MSG_SESSION_EXPIRED, Resource,
    Screen, Session, SessionStore, Settings, UserProfile, WaterStatus,
};

// ── Fake source ─────────────────────────────────────────────────────

#[derive(Default)]
struct FakeState {
    devices: Mutex<Vec<Device>>,
    active: Mutex<HashMap<Resource, usize>>,
    calls: Mutex<Vec<String>>,
    tokens: Mutex<HashMap<DeviceId, String>>,
    reject_session: AtomicBool,
}

impl FakeState {
    fn read(&self, resource: &Resource) -> Result<FeedData, CoreError> {
        let devices = self.devices.lock().unwrap().clone();
        Ok(match resource {
            Resource::Dashboard => FeedData::Dashboard(
                devices
                    .iter()
                    .map(|d| DashboardEntry {
                        id: d.id.clone(),
                        name: d.name.clone(),
                        water_level_cm: 42.0,
                        status: WaterStatus::Watch,
                        updated_at: None,
                    })
                    .collect(),
            ),
            _ if self.reject_session.load(Ordering::SeqCst) => return Err(CoreError::SessionExpired),
            Resource::Devices => FeedData::Devices(devices),
            Resource::Settings => FeedData::Settings(Settings {
                global_api_key: "GLOBAL".into(),
            }),
            Resource::Stats => FeedData::Stats(AdminStats {
                total_devices: 2,
                ..AdminStats::default()
            }),
            Resource::History(id) | Resource::Trend(id) => FeedData::History(
                id.clone(),
                vec![Measurement {
                    device_id: id.clone(),
                    water_level_cm: 42.0,
                    status: WaterStatus::Watch,
                    created_at: Some(Utc::now()),
                }],
            ),
        })
    }

    fn active(&self, resource: &Resource) -> usize {
        self.active.lock().unwrap().get(resource).copied().unwrap_or(0)
    }

    fn called(&self, name: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|c| c == name)
    }
}

struct FakeSource {
    kind: BackendKind,
    state: Arc<FakeState>,
}

impl FakeSource {
    fn new(kind: BackendKind) -> Self {
        let state = FakeState::default();
        *state.devices.lock().unwrap() = ["a", "x"]
            .into_iter()
            .map(|id| Device {
                id: DeviceId::from(id),
                name: format!("Gate {id}"),
                secret_key: "OLDTOKEN".into(),
                created_at: None,
            })
            .collect();
        Self {
            kind,
            state: Arc::new(state),
        }
    }

    fn session(&self) -> Session {
        Session {
            token: SecretString::from("token".to_owned()),
            refresh_token: None,
            user: UserProfile {
                username: Some("admin".into()),
                ..UserProfile::default()
            },
            backend: self.kind,
            issued_at: Utc::now(),
        }
    }

    fn record(&self, call: &str) {
        self.state.calls.lock().unwrap().push(call.to_owned());
    }
}

#[async_trait]
impl DataSource for FakeSource {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn login(&self, credentials: &Credentials) -> Result<Session, CoreError> {
        self.record("login");
        if credentials.password.expose_secret() != "secret" {
            return Err(CoreError::AuthenticationFailed {
                message: "Invalid credentials".into(),
            });
        }
        Ok(self.session())
    }

    async fn resume(&self, session: &Session) -> Result<Session, CoreError> {
        self.record("resume");
        Ok(session.clone())
    }

    async fn logout(&self) {
        self.record("logout");
    }

    fn follow(&self, resource: Resource, sink: FeedSink, cancel: CancellationToken) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        *state.active.lock().unwrap().entry(resource.clone()).or_default() += 1;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_millis(10));
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        let ticket = sink.ticket();
                        match state.read(&resource) {
                            Ok(data) => {
                                sink.apply(ticket, data);
                            }
                            Err(e) => sink.fail(ticket, &e),
                        }
                    }
                }
            }
            *state.active.lock().unwrap().entry(resource).or_default() -= 1;
        })
    }

    async fn create_device(&self, name: &str, _secret_key: &str) -> Result<(), CoreError> {
        self.record(&format!("create:{name}"));
        Ok(())
    }

    // The fake keeps serving deleted devices, like a read that raced the delete.
    async fn delete_device(&self, id: &DeviceId) -> Result<(), CoreError> {
        self.record(&format!("delete:{id}"));
        Ok(())
    }

    async fn set_device_token(&self, id: &DeviceId, secret_key: &str) -> Result<(), CoreError> {
        self.state
            .tokens
            .lock()
            .unwrap()
            .insert(id.clone(), secret_key.to_owned());
        Ok(())
    }

    async fn update_settings(&self, _settings: &Settings) -> Result<(), CoreError> {
        if self.state.reject_session.load(Ordering::SeqCst) {
            return Err(CoreError::SessionExpired);
        }
        self.record("settings");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

async fn started(kind: BackendKind, sessions: SessionStore) -> (Controller, Arc<FakeState>) {
    let source = FakeSource::new(kind);
    let state = Arc::clone(&source.state);
    let ctrl = Controller::new(Arc::new(source), sessions);
    ctrl.start().await.unwrap();
    (ctrl, state)
}

async fn signed_in(kind: BackendKind) -> (Controller, Arc<FakeState>) {
    let (ctrl, state) = started(kind, SessionStore::ephemeral()).await;
    ctrl.request_admin().await;
    ctrl.login("admin", SecretString::from("secret".to_owned()))
        .await
        .unwrap();
    (ctrl, state)
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

// ── Navigation ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_starts_on_dashboard_and_clears_loading() {
    let (ctrl, _state) = started(BackendKind::Rest, SessionStore::ephemeral()).await;
    assert_eq!(ctrl.view().screen, Screen::Dashboard);

    let store = Arc::clone(ctrl.store());
    eventually(|| {
        let ctrl = ctrl.clone();
        let store = Arc::clone(&store);
        async move { !ctrl.view().loading && store.dashboard().len() == 2 }
    })
    .await;

    let entry = ctrl.store().dashboard_entry(&DeviceId::from("a")).unwrap();
    assert!((entry.water_level_cm - 42.0).abs() < f64::EPSILON);
    assert_eq!(entry.status.label(), "SIAGA");
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_open_device_requires_dashboard_and_known_id() {
    let (ctrl, _state) = started(BackendKind::Rest, SessionStore::ephemeral()).await;
    let store = Arc::clone(ctrl.store());
    eventually(|| {
        let store = Arc::clone(&store);
        async move { !store.dashboard().is_empty() }
    })
    .await;

    let unknown = ctrl.open_device(&DeviceId::from("nope")).await;
    assert!(matches!(unknown, Err(CoreError::DeviceNotFound { .. })));

    ctrl.request_admin().await;
    assert_eq!(ctrl.view().screen, Screen::Login);
    let from_login = ctrl.open_device(&DeviceId::from("a")).await;
    assert!(matches!(
        from_login,
        Err(CoreError::InvalidTransition {
            from: Screen::Login,
            ..
        })
    ));
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_leaving_detail_stops_history_updates() {
    let (ctrl, state) = started(BackendKind::Rest, SessionStore::ephemeral()).await;
    let store = Arc::clone(ctrl.store());
    let a = DeviceId::from("a");
    eventually(|| {
        let store = Arc::clone(&store);
        async move { !store.dashboard().is_empty() }
    })
    .await;

    ctrl.open_device(&a).await.unwrap();
    let view = ctrl.view();
    assert_eq!(view.screen, Screen::DeviceDetail);
    assert_eq!(view.selected, Some(a.clone()));
    eventually(|| {
        let store = Arc::clone(&store);
        let a = a.clone();
        async move { store.history(&a).is_some() }
    })
    .await;

    ctrl.show_dashboard().await;
    assert_eq!(state.active(&Resource::History(a.clone())), 0);
    assert_eq!(ctrl.view().selected, None);

    let before = store.history(&a).unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(Arc::ptr_eq(&before, &store.history(&a).unwrap()));
    ctrl.shutdown().await;
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn test_wrong_password_stays_on_login() {
    let (ctrl, _state) = started(BackendKind::Rest, SessionStore::ephemeral()).await;
    ctrl.request_admin().await;

    let result = ctrl.login("admin", SecretString::from("wrong".to_owned())).await;
    assert!(matches!(result, Err(CoreError::AuthenticationFailed { .. })));

    let view = ctrl.view();
    assert_eq!(view.screen, Screen::Login);
    assert_eq!(view.error.as_deref(), Some(MSG_BAD_CREDENTIALS));
    assert!(!ctrl.is_authenticated());
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_empty_credentials_are_not_sent() {
    let (ctrl, state) = started(BackendKind::Rest, SessionStore::ephemeral()).await;
    ctrl.request_admin().await;

    let result = ctrl.login("  ", SecretString::from("secret".to_owned())).await;
    assert!(matches!(result, Err(CoreError::ValidationFailed { .. })));
    assert!(!state.called("login"));
    assert!(ctrl.view().error.is_some());
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_login_enters_admin_and_follows_every_device() {
    let (ctrl, state) = signed_in(BackendKind::Rest).await;
    assert_eq!(ctrl.view().screen, Screen::Admin);
    assert!(ctrl.view().error.is_none());

    let store = Arc::clone(ctrl.store());
    eventually(|| {
        let store = Arc::clone(&store);
        async move {
            store.devices().len() == 2
                && store.settings().is_some()
                && store.stats().is_some()
                && store.histories().len() == 2
        }
    })
    .await;
    assert_eq!(state.active(&Resource::Trend(DeviceId::from("x"))), 1);

    ctrl.show_dashboard().await;
    assert_eq!(state.active(&Resource::Devices), 0);
    assert_eq!(state.active(&Resource::Trend(DeviceId::from("x"))), 0);
    assert_eq!(state.active(&Resource::Dashboard), 1);
    ctrl.shutdown().await;
    assert_eq!(state.active(&Resource::Dashboard), 0);
}

#[tokio::test]
async fn test_login_only_from_login_screen() {
    let (ctrl, _state) = started(BackendKind::Rest, SessionStore::ephemeral()).await;
    let result = ctrl.login("admin", SecretString::from("secret".to_owned())).await;
    assert!(matches!(result, Err(CoreError::InvalidTransition { .. })));
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_logout_clears_persisted_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let (ctrl, _state) = started(BackendKind::Rest, SessionStore::new(&path)).await;
    ctrl.request_admin().await;
    ctrl.login("admin", SecretString::from("secret".to_owned()))
        .await
        .unwrap();
    assert!(path.exists());

    ctrl.logout().await;
    assert!(!path.exists());
    assert_eq!(ctrl.view().screen, Screen::Dashboard);
    assert!(ctrl.store().devices().is_empty());
    ctrl.shutdown().await;

    // A restart comes back signed out.
    let (ctrl, state) = started(BackendKind::Rest, SessionStore::new(&path)).await;
    assert!(!ctrl.is_authenticated());
    assert!(!state.called("resume"));
    ctrl.request_admin().await;
    assert_eq!(ctrl.view().screen, Screen::Login);
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_persisted_session_is_restored() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = SessionStore::new(dir.path().join("session.json"));
    sessions
        .save(&FakeSource::new(BackendKind::Rest).session())
        .unwrap();

    let (ctrl, state) = started(BackendKind::Rest, sessions).await;
    assert!(state.called("resume"));
    assert!(ctrl.is_authenticated());
    ctrl.request_admin().await;
    assert_eq!(ctrl.view().screen, Screen::Admin);
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_rejected_session_returns_rest_to_dashboard() {
    let (ctrl, state) = signed_in(BackendKind::Rest).await;
    state.reject_session.store(true, Ordering::SeqCst);

    let mut view = ctrl.subscribe_view();
    eventually(|| {
        let ctrl = ctrl.clone();
        async move { !ctrl.is_authenticated() }
    })
    .await;
    view.wait_for(|v| v.screen == Screen::Dashboard).await.unwrap();
    assert!(state.called("logout"));
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_rejected_session_sends_realtime_to_login() {
    let (ctrl, state) = signed_in(BackendKind::Realtime).await;
    state.reject_session.store(true, Ordering::SeqCst);

    let mut view = ctrl.subscribe_view();
    let settled = view.wait_for(|v| v.screen == Screen::Login).await.unwrap().clone();
    assert_eq!(settled.error.as_deref(), Some(MSG_SESSION_EXPIRED));
    assert!(!ctrl.is_authenticated());
    ctrl.shutdown().await;
}

// ── Mutations ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_mutations_require_sign_in() {
    let (ctrl, _state) = started(BackendKind::Rest, SessionStore::ephemeral()).await;
    let result = ctrl.create_device("Gate B", "ABCD1234").await;
    assert!(matches!(result, Err(CoreError::NotAuthenticated)));
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_create_device_validates_fields() {
    let (ctrl, state) = signed_in(BackendKind::Rest).await;

    let err = ctrl.create_device("Gate B", "  ").await.unwrap_err();
    assert_eq!(err.user_message(), "Token wajib diisi.");
    let err = ctrl.create_device("", "ABCD1234").await.unwrap_err();
    assert_eq!(err.user_message(), "Nama perangkat wajib diisi.");
    assert!(!state.calls.lock().unwrap().iter().any(|c| c.starts_with("create:")));

    ctrl.create_device(" Gate B ", "ABCD1234").await.unwrap();
    assert!(state.called("create:Gate B"));
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_deleted_device_stays_gone() {
    let (ctrl, state) = signed_in(BackendKind::Rest).await;
    let store = Arc::clone(ctrl.store());
    let x = DeviceId::from("x");
    eventually(|| {
        let store = Arc::clone(&store);
        let x = x.clone();
        async move { store.device(&x).is_some() && store.history(&x).is_some() }
    })
    .await;

    ctrl.delete_device(&x).await.unwrap();
    assert!(state.called("delete:x"));

    // The source keeps returning "x"; several ticks later it is still gone.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(store.dashboard_entry(&x).is_none());
    assert!(store.device(&x).is_none());
    assert!(store.history(&x).is_none());
    assert!(store.device(&DeviceId::from("a")).is_some());
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_reset_token_issues_fresh_token() {
    let (ctrl, state) = signed_in(BackendKind::Rest).await;
    let store = Arc::clone(ctrl.store());
    let a = DeviceId::from("a");
    eventually(|| {
        let store = Arc::clone(&store);
        let a = a.clone();
        async move { store.device(&a).is_some() }
    })
    .await;

    let token = ctrl.reset_device_token(&a).await.unwrap();
    assert_eq!(token.len(), 8);
    assert!(token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    assert_ne!(token, "OLDTOKEN");
    assert_eq!(state.tokens.lock().unwrap().get(&a), Some(&token));

    let missing = ctrl.reset_device_token(&DeviceId::from("nope")).await;
    assert!(matches!(missing, Err(CoreError::DeviceNotFound { .. })));
    ctrl.shutdown().await;
}

#[tokio::test]
async fn test_rejected_write_forces_logout() {
    let (ctrl, state) = signed_in(BackendKind::Realtime).await;
    assert!(ctrl.update_settings("   ").await.is_err());
    assert!(!state.called("settings"));

    state.reject_session.store(true, Ordering::SeqCst);
    let result = ctrl.update_settings("NEWKEY").await;
    assert!(matches!(result, Err(CoreError::SessionExpired)));
    assert!(!ctrl.is_authenticated());
    ctrl.subscribe_view()
        .wait_for(|v| v.screen == Screen::Login)
        .await
        .unwrap();
    ctrl.shutdown().await;
}
