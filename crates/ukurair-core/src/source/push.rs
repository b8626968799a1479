// ── Realtime binding ──
//
// One server-sent-event subscription per followed resource; every full
// value the stream emits replaces the slice. The database has no
// statistics endpoint, so admin statistics are derived from the device
// list and the histories already held in the store.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::Utc;
use secrecy::SecretString;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ukurair_api::realtime::models::{last_entries_query, paths};
use ukurair_api::{RealtimeClient, StreamEvent};

use super::{DataSource, Resource};
use crate::convert;
use crate::error::CoreError;
use crate::feed::FeedSink;
use crate::model::{BackendKind, Credentials, DeviceId, Session, Settings, UserProfile};
use crate::store::FeedData;

/// Subscribes to the realtime database.
pub struct PushSource {
    inner: Arc<PushInner>,
}

struct PushInner {
    client: RealtimeClient,
    refresh_token: ArcSwapOption<SecretString>,
    history_limit: usize,
}

impl PushSource {
    pub fn new(client: RealtimeClient, history_limit: usize) -> Self {
        Self {
            inner: Arc::new(PushInner {
                client,
                refresh_token: ArcSwapOption::empty(),
                history_limit,
            }),
        }
    }

    pub fn client(&self) -> &RealtimeClient {
        &self.inner.client
    }
}

impl PushInner {
    /// Database path and query backing `resource`. `None` for derived slices.
    fn target(&self, resource: &Resource) -> Option<(String, Vec<(String, String)>)> {
        match resource {
            Resource::Dashboard => Some((paths::DASHBOARD.to_owned(), Vec::new())),
            Resource::Devices => Some((paths::DEVICES.to_owned(), Vec::new())),
            Resource::Settings => Some((paths::SETTINGS.to_owned(), Vec::new())),
            Resource::History(id) | Resource::Trend(id) => Some((
                paths::measurements(id.as_str()),
                last_entries_query(self.history_limit),
            )),
            Resource::Stats => None,
        }
    }

    /// Swap the revoked ID token for a fresh one.
    async fn renew(&self) -> Result<(), CoreError> {
        let Some(refresh_token) = self.refresh_token.load_full() else {
            return Err(CoreError::SessionExpired);
        };
        let renewed = self.client.refresh(&refresh_token).await?;
        self.refresh_token.store(Some(Arc::new(renewed.refresh_token)));
        info!("ID token renewed");
        Ok(())
    }

    async fn run_stream(
        &self,
        resource: Resource,
        path: String,
        query: Vec<(String, String)>,
        sink: FeedSink,
        cancel: CancellationToken,
    ) {
        loop {
            // The dashboard is public and outlives sessions.
            let subscribed = if resource == Resource::Dashboard {
                self.client.subscribe_public(&path, &query, cancel.clone())
            } else {
                self.client.subscribe(&path, &query, cancel.clone())
            };
            let mut events = match subscribed {
                Ok(rx) => rx,
                Err(e) => {
                    sink.fail(sink.ticket(), &e.into());
                    return;
                }
            };
            debug!(%resource, path = %path, "subscribed");

            let mut resubscribe = false;
            loop {
                let event = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    event = events.recv() => event,
                };
                let Some(event) = event else { break };

                match event {
                    StreamEvent::Value(value) => {
                        if let Some(data) = decode(&resource, &value) {
                            sink.apply(sink.ticket(), data);
                        }
                    }
                    StreamEvent::Disconnected { attempt, error } => {
                        warn!(%resource, attempt, error = %error, "stream dropped; reconnecting");
                    }
                    StreamEvent::PermissionDenied => {
                        let err = CoreError::Api {
                            status: 401,
                            message: format!("permission denied for {path}"),
                        };
                        sink.fail(sink.ticket(), &err);
                        break;
                    }
                    StreamEvent::AuthRevoked => {
                        match self.renew().await {
                            Ok(()) => resubscribe = true,
                            Err(e) => {
                                debug!(%resource, error = %e, "token renewal failed");
                                sink.fail(sink.ticket(), &CoreError::SessionExpired);
                            }
                        }
                        break;
                    }
                }
            }

            if !resubscribe || cancel.is_cancelled() {
                break;
            }
        }
        debug!(%resource, "subscription closed");
    }
}

fn decode(resource: &Resource, value: &Value) -> Option<FeedData> {
    match resource {
        Resource::Dashboard => Some(FeedData::Dashboard(convert::dashboard_from_tree(value))),
        Resource::Devices => Some(FeedData::Devices(convert::devices_from_tree(value))),
        Resource::Settings => Some(FeedData::Settings(convert::settings_from_tree(value))),
        Resource::History(id) | Resource::Trend(id) => Some(FeedData::History(
            id.clone(),
            convert::history_from_tree(id, value),
        )),
        Resource::Stats => None,
    }
}

/// Recompute statistics whenever the device list or a history changes.
async fn derive_stats(sink: FeedSink, cancel: CancellationToken) {
    let store = Arc::clone(sink.store());
    let mut devices = store.subscribe_devices();
    let mut histories = store.subscribe_histories();

    loop {
        let stats = convert::stats_from_local(&store.devices(), &store.histories());
        sink.apply(sink.ticket(), FeedData::Stats(stats));

        let alive = tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            changed = devices.changed() => changed.is_some(),
            changed = histories.changed() => changed.is_some(),
        };
        if !alive {
            break;
        }
    }
}

#[async_trait]
impl DataSource for PushSource {
    fn kind(&self) -> BackendKind {
        BackendKind::Realtime
    }

    async fn login(&self, credentials: &Credentials) -> Result<Session, CoreError> {
        let identity = self
            .inner
            .client
            .sign_in(&credentials.username, &credentials.password)
            .await?;
        self.inner
            .refresh_token
            .store(Some(Arc::new(identity.refresh_token.clone())));

        Ok(Session {
            token: identity.id_token,
            refresh_token: Some(identity.refresh_token),
            user: UserProfile {
                id: identity.local_id,
                username: identity.display_name,
                email: identity.email.or_else(|| Some(credentials.username.clone())),
                role: None,
            },
            backend: BackendKind::Realtime,
            issued_at: Utc::now(),
        })
    }

    async fn resume(&self, session: &Session) -> Result<Session, CoreError> {
        // ID tokens live an hour; always start from the refresh token.
        let Some(refresh_token) = &session.refresh_token else {
            return Err(CoreError::SessionExpired);
        };
        let renewed = self.inner.client.refresh(refresh_token).await?;
        self.inner
            .refresh_token
            .store(Some(Arc::new(renewed.refresh_token.clone())));

        Ok(Session {
            token: renewed.id_token,
            refresh_token: Some(renewed.refresh_token),
            user: session.user.clone(),
            backend: BackendKind::Realtime,
            issued_at: Utc::now(),
        })
    }

    async fn logout(&self) {
        self.inner.client.sign_out();
        self.inner.refresh_token.store(None);
    }

    fn follow(&self, resource: Resource, sink: FeedSink, cancel: CancellationToken) -> JoinHandle<()> {
        match self.inner.target(&resource) {
            Some((path, query)) => {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    inner.run_stream(resource, path, query, sink, cancel).await;
                })
            }
            None => tokio::spawn(derive_stats(sink, cancel)),
        }
    }

    async fn create_device(&self, name: &str, secret_key: &str) -> Result<(), CoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        Ok(self.inner.client.create_device(&id, name, secret_key).await?)
    }

    async fn delete_device(&self, id: &DeviceId) -> Result<(), CoreError> {
        Ok(self.inner.client.delete_device(id.as_str()).await?)
    }

    async fn set_device_token(&self, id: &DeviceId, secret_key: &str) -> Result<(), CoreError> {
        Ok(self
            .inner
            .client
            .update_device_token(id.as_str(), secret_key)
            .await?)
    }

    async fn update_settings(&self, settings: &Settings) -> Result<(), CoreError> {
        Ok(self
            .inner
            .client
            .update_settings(&settings.global_api_key)
            .await?)
    }
}
