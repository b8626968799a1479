// ── Controller ──
//
// Owns the view state machine and everything hanging off it: the session,
// the data source, the store and the feeds each screen needs. Navigation
// retires the previous screen's feeds before starting the next screen's.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

use arc_swap::ArcSwapOption;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::error::{CoreError, MSG_BAD_CREDENTIALS, MSG_CONNECTION_FAILED, MSG_SESSION_EXPIRED};
use crate::feed::{EpochClock, FeedScope, FeedSignal, FeedSink};
use crate::model::{BackendKind, Credentials, Device, DeviceId, Screen, Session, Settings, ViewState};
use crate::session::SessionStore;
use crate::source::{self, DataSource, Resource};
use crate::store::DataStore;
use crate::token::generate_device_token;

pub const MSG_MISSING_CREDENTIALS: &str = "Username dan password wajib diisi.";
pub const MSG_MISSING_NAME: &str = "Nama perangkat wajib diisi.";
pub const MSG_MISSING_TOKEN: &str = "Token wajib diisi.";
pub const MSG_MISSING_API_KEY: &str = "API key wajib diisi.";

/// The main entry point for front-ends.
///
/// Cheaply cloneable via `Arc<ControllerInner>`.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    source: Arc<dyn DataSource>,
    sessions: SessionStore,
    store: Arc<DataStore>,
    clock: Arc<EpochClock>,
    view: watch::Sender<ViewState>,
    session: ArcSwapOption<Session>,
    signals_tx: mpsc::UnboundedSender<FeedSignal>,
    signals_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<FeedSignal>>>,
    /// Parent of every task the controller spawns.
    cancel: CancellationToken,
    /// Child of `cancel` owned by the current screen.
    view_cancel: std::sync::Mutex<CancellationToken>,
    view_tasks: Mutex<Vec<JoinHandle<()>>>,
    background: Mutex<Vec<JoinHandle<()>>>,
    /// Serializes navigations.
    nav: Mutex<()>,
    dashboard_settled: AtomicBool,
    started: AtomicBool,
}

impl Controller {
    /// Wire a controller to `source`. Does not start anything; call
    /// [`start()`](Self::start).
    pub fn new(source: Arc<dyn DataSource>, sessions: SessionStore) -> Self {
        let cancel = CancellationToken::new();
        let (view, _) = watch::channel(ViewState {
            loading: true,
            ..ViewState::default()
        });
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(ControllerInner {
                source,
                sessions,
                store: Arc::new(DataStore::new()),
                clock: Arc::new(EpochClock::default()),
                view,
                session: ArcSwapOption::empty(),
                signals_tx,
                signals_rx: std::sync::Mutex::new(Some(signals_rx)),
                view_cancel: std::sync::Mutex::new(cancel.child_token()),
                cancel,
                view_tasks: Mutex::new(Vec::new()),
                background: Mutex::new(Vec::new()),
                nav: Mutex::new(()),
                dashboard_settled: AtomicBool::new(false),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Build the data source and session store `config` describes.
    pub fn from_config(config: &CoreConfig) -> Result<Self, CoreError> {
        let source = source::from_config(config)?;
        let sessions = config
            .session_path
            .as_ref()
            .map_or_else(SessionStore::ephemeral, SessionStore::new);
        Ok(Self::new(source, sessions))
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Restore a persisted session and start the always-on dashboard feed.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.restore_session().await;

        let rx = self
            .inner
            .signals_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let mut background = self.inner.background.lock().await;
        if let Some(rx) = rx {
            let ctrl = self.clone();
            background.push(tokio::spawn(signal_task(ctrl, rx)));
        }
        background.push(self.follow(Resource::Dashboard, self.inner.cancel.child_token()));

        info!(backend = %self.inner.source.kind(), "controller started");
        Ok(())
    }

    /// Stop every feed and wait for the tasks to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.clock.advance(FeedScope::View);
        self.inner.clock.advance(FeedScope::Dashboard);

        let mut handles: Vec<JoinHandle<()>> = self.inner.view_tasks.lock().await.drain(..).collect();
        handles.extend(self.inner.background.lock().await.drain(..));
        for handle in handles {
            let _ = handle.await;
        }
        debug!("controller stopped");
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn view(&self) -> ViewState {
        self.inner.view.borrow().clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<ViewState> {
        self.inner.view.subscribe()
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.inner.session.load_full()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.load().is_some()
    }

    pub fn backend(&self) -> BackendKind {
        self.inner.source.kind()
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    // ── Navigation ───────────────────────────────────────────────────

    /// dashboard → device-detail.
    pub async fn open_device(&self, id: &DeviceId) -> Result<(), CoreError> {
        let from = self.inner.view.borrow().screen;
        if from != Screen::Dashboard {
            return Err(CoreError::InvalidTransition {
                from,
                action: "open a device",
            });
        }
        if self.inner.store.dashboard_entry(id).is_none() {
            return Err(CoreError::DeviceNotFound { id: id.to_string() });
        }
        self.navigate(Screen::DeviceDetail, Some(id.clone()), None).await;
        Ok(())
    }

    /// Back to the public dashboard.
    pub async fn show_dashboard(&self) {
        if self.inner.view.borrow().screen == Screen::Dashboard {
            return;
        }
        self.navigate(Screen::Dashboard, None, None).await;
    }

    /// Admin panel when signed in, login form otherwise.
    pub async fn request_admin(&self) {
        let target = if self.is_authenticated() {
            Screen::Admin
        } else {
            Screen::Login
        };
        if self.inner.view.borrow().screen != target {
            self.navigate(target, None, None).await;
        }
    }

    // ── Authentication ───────────────────────────────────────────────

    /// login → admin. Failures stay on the login form with a message.
    pub async fn login(&self, username: &str, password: SecretString) -> Result<(), CoreError> {
        let from = self.inner.view.borrow().screen;
        if from != Screen::Login {
            return Err(CoreError::InvalidTransition { from, action: "log in" });
        }

        let username = username.trim();
        if username.is_empty() || password.expose_secret().is_empty() {
            self.set_error(Some(MSG_MISSING_CREDENTIALS.into()));
            return Err(CoreError::validation("credentials", MSG_MISSING_CREDENTIALS));
        }
        self.set_error(None);

        let credentials = Credentials {
            username: username.to_owned(),
            password,
        };
        match self.inner.source.login(&credentials).await {
            Ok(session) => {
                if let Err(e) = self.inner.sessions.save(&session) {
                    warn!(error = %e, "could not persist session");
                }
                info!(user = session.user.display_name(), "signed in");
                self.inner.session.store(Some(Arc::new(session)));
                self.navigate(Screen::Admin, None, None).await;
                Ok(())
            }
            Err(e) => {
                let message = match &e {
                    CoreError::AuthenticationFailed { .. } => MSG_BAD_CREDENTIALS,
                    _ => MSG_CONNECTION_FAILED,
                };
                warn!(error = %e, "login failed");
                self.set_error(Some(message.into()));
                Err(e)
            }
        }
    }

    /// Sign out, forget the persisted session and return to the dashboard.
    pub async fn logout(&self) {
        let _ = self.end_session().await;
        info!("signed out");
        self.navigate(Screen::Dashboard, None, None).await;
    }

    /// Forced logout after the backend rejected the session. No-op when
    /// already signed out.
    pub async fn expire_session(&self) {
        if !self.is_authenticated() || !self.end_session().await {
            return;
        }
        warn!("session expired");
        match self.inner.source.kind() {
            BackendKind::Rest => self.navigate(Screen::Dashboard, None, None).await,
            BackendKind::Realtime => {
                self.navigate(Screen::Login, None, Some(MSG_SESSION_EXPIRED.into()))
                    .await;
            }
        }
    }

    // ── Mutations ────────────────────────────────────────────────────

    pub async fn create_device(&self, name: &str, secret_key: &str) -> Result<(), CoreError> {
        self.require_admin("add a device")?;
        let name = name.trim();
        let secret_key = secret_key.trim();
        if name.is_empty() {
            return Err(CoreError::validation("name", MSG_MISSING_NAME));
        }
        if secret_key.is_empty() {
            return Err(CoreError::validation("secret_key", MSG_MISSING_TOKEN));
        }

        let result = self.inner.source.create_device(name, secret_key).await;
        self.settle_mutation(result).await?;
        info!(name, "device created");
        Ok(())
    }

    /// Delete a device with its snapshot and history.
    pub async fn delete_device(&self, id: &DeviceId) -> Result<(), CoreError> {
        self.require_admin("delete a device")?;
        let result = self.inner.source.delete_device(id).await;
        self.settle_mutation(result).await?;
        self.inner.store.forget_device(id);
        info!(%id, "device deleted");
        Ok(())
    }

    /// Issue a fresh token for a device. Returns the new token.
    pub async fn reset_device_token(&self, id: &DeviceId) -> Result<String, CoreError> {
        self.require_admin("reset a token")?;
        let device: Device = self
            .inner
            .store
            .device(id)
            .ok_or_else(|| CoreError::DeviceNotFound { id: id.to_string() })?;

        let token = generate_device_token(Some(&device.secret_key));
        let result = self.inner.source.set_device_token(id, &token).await;
        self.settle_mutation(result).await?;
        info!(%id, "device token reset");
        Ok(token)
    }

    pub async fn update_settings(&self, global_api_key: &str) -> Result<(), CoreError> {
        self.require_admin("update settings")?;
        let global_api_key = global_api_key.trim();
        if global_api_key.is_empty() {
            return Err(CoreError::validation("global_api_key", MSG_MISSING_API_KEY));
        }

        let settings = Settings {
            global_api_key: global_api_key.to_owned(),
        };
        let result = self.inner.source.update_settings(&settings).await;
        self.settle_mutation(result).await?;
        info!("settings updated");
        Ok(())
    }

    // ── Private helpers ──────────────────────────────────────────────

    async fn restore_session(&self) {
        let kind = self.inner.source.kind();
        let Some(saved) = self.inner.sessions.load(kind) else {
            return;
        };

        match self.inner.source.resume(&saved).await {
            Ok(session) => {
                if let Err(e) = self.inner.sessions.save(&session) {
                    warn!(error = %e, "could not persist session");
                }
                info!(user = session.user.display_name(), "session restored");
                self.inner.session.store(Some(Arc::new(session)));
            }
            Err(e @ (CoreError::SessionExpired | CoreError::AuthenticationFailed { .. })) => {
                info!(error = %e, "stored session is no longer valid");
                if let Err(e) = self.inner.sessions.clear() {
                    warn!(error = %e, "could not clear session");
                }
            }
            Err(e) => warn!(error = %e, "could not restore session; continuing signed out"),
        }
    }

    /// Drop the session and everything only an admin may see. Returns
    /// `false` if there was no session.
    async fn end_session(&self) -> bool {
        let ended = self.inner.session.swap(None).is_some();
        {
            let _guard = self.inner.nav.lock().await;
            self.retire_view();
        }
        self.inner.source.logout().await;
        if let Err(e) = self.inner.sessions.clear() {
            warn!(error = %e, "could not clear session");
        }
        self.inner.store.clear_admin();
        ended
    }

    fn require_admin(&self, action: &'static str) -> Result<(), CoreError> {
        if !self.is_authenticated() {
            return Err(CoreError::NotAuthenticated);
        }
        let from = self.inner.view.borrow().screen;
        if from != Screen::Admin {
            return Err(CoreError::InvalidTransition { from, action });
        }
        Ok(())
    }

    /// A rejected session on a write forces logout like a rejected read.
    async fn settle_mutation<T>(&self, result: Result<T, CoreError>) -> Result<T, CoreError> {
        if let Err(e) = &result {
            warn!(error = %e, "mutation failed");
            if e.is_session_expired() {
                self.expire_session().await;
            }
        }
        result
    }

    fn set_error(&self, error: Option<String>) {
        self.inner.view.send_if_modified(|v| {
            if v.error == error {
                return false;
            }
            v.error = error;
            true
        });
    }

    /// Retire the current screen's feeds, then enter `screen`.
    async fn navigate(&self, screen: Screen, selected: Option<DeviceId>, error: Option<String>) {
        let _guard = self.inner.nav.lock().await;
        let from = self.inner.view.borrow().screen;
        let token = self.retire_view();

        let mut tasks = self.inner.view_tasks.lock().await;
        for handle in tasks.drain(..) {
            let _ = handle.await;
        }

        let loading = screen == Screen::Dashboard && !self.inner.dashboard_settled.load(Ordering::SeqCst);
        self.inner.view.send_replace(ViewState {
            screen,
            selected: selected.clone(),
            error,
            loading,
        });
        debug!(%from, to = %screen, "navigated");

        match screen {
            Screen::Dashboard | Screen::Login => {}
            Screen::DeviceDetail => {
                if let Some(id) = selected {
                    tasks.push(self.follow(Resource::History(id), token));
                }
            }
            Screen::Admin => {
                tasks.push(self.follow(Resource::Devices, token.clone()));
                tasks.push(self.follow(Resource::Settings, token.clone()));
                tasks.push(self.follow(Resource::Stats, token.clone()));
                tasks.push(tokio::spawn(follow_histories(self.clone(), token)));
            }
        }
    }

    /// Cancel the current screen's feeds and invalidate their tickets.
    /// Returns the token for the next screen.
    fn retire_view(&self) -> CancellationToken {
        let token = self.inner.cancel.child_token();
        let previous = std::mem::replace(
            &mut *self
                .inner
                .view_cancel
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            token.clone(),
        );
        previous.cancel();
        self.inner.clock.advance(FeedScope::View);
        token
    }

    fn follow(&self, resource: Resource, cancel: CancellationToken) -> JoinHandle<()> {
        let sink = FeedSink::new(
            resource.clone(),
            Arc::clone(&self.inner.clock),
            Arc::clone(&self.inner.store),
            self.inner.signals_tx.clone(),
        );
        self.inner.source.follow(resource, sink, cancel)
    }

    fn handle_signal(&self, signal: &FeedSignal) -> bool {
        match signal {
            FeedSignal::Settled(Resource::Dashboard) => {
                self.inner.dashboard_settled.store(true, Ordering::SeqCst);
                self.inner.view.send_if_modified(|v| std::mem::take(&mut v.loading));
                false
            }
            FeedSignal::Settled(_) => false,
            FeedSignal::Expired => true,
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn signal_task(ctrl: Controller, mut rx: mpsc::UnboundedReceiver<FeedSignal>) {
    let cancel = ctrl.inner.cancel.clone();
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            signal = rx.recv() => {
                let Some(signal) = signal else { break };
                if ctrl.handle_signal(&signal) {
                    ctrl.expire_session().await;
                }
            }
        }
    }
}

/// Keep one history feed per listed device while the admin panel is open.
async fn follow_histories(ctrl: Controller, cancel: CancellationToken) {
    let mut devices = ctrl.inner.store.subscribe_devices();
    let mut followed: HashMap<DeviceId, (CancellationToken, JoinHandle<()>)> = HashMap::new();
    let mut listed = devices.current().clone();

    loop {
        let wanted: HashSet<DeviceId> = listed.iter().map(|d| d.id.clone()).collect();

        followed.retain(|id, (token, _)| {
            let keep = wanted.contains(id);
            if !keep {
                token.cancel();
            }
            keep
        });
        ctrl.inner.store.retain_histories(|id| wanted.contains(id));

        for id in wanted {
            if !followed.contains_key(&id) {
                let token = cancel.child_token();
                let handle = ctrl.follow(Resource::Trend(id.clone()), token.clone());
                followed.insert(id, (token, handle));
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = devices.changed() => match next {
                Some(next) => listed = next,
                None => break,
            },
        }
    }

    for (_, (token, handle)) in followed {
        token.cancel();
        let _ = handle.await;
    }
}
