// ── Data sources ──
//
// A `DataSource` is one backend binding: how to authenticate, how to keep
// a resource fresh in the store, and how to mutate it. The REST API is
// polled (`PollingSource`); the realtime database pushes (`PushSource`).

mod polling;
mod push;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{BackendConfig, CoreConfig};
use crate::error::CoreError;
use crate::feed::{FeedScope, FeedSink};
use crate::model::{BackendKind, Credentials, DeviceId, Session, Settings};

pub use polling::PollingSource;
pub use push::PushSource;

/// Something a screen can follow.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    Dashboard,
    Devices,
    Settings,
    Stats,
    /// A device's readings on the detail screen.
    History(DeviceId),
    /// The same readings charted on the admin panel, refreshed at the
    /// admin cadence.
    Trend(DeviceId),
}

impl Resource {
    pub fn scope(&self) -> FeedScope {
        match self {
            Self::Dashboard => FeedScope::Dashboard,
            _ => FeedScope::View,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dashboard => f.write_str("dashboard"),
            Self::Devices => f.write_str("devices"),
            Self::Settings => f.write_str("settings"),
            Self::Stats => f.write_str("stats"),
            Self::History(id) => write!(f, "history/{id}"),
            Self::Trend(id) => write!(f, "trend/{id}"),
        }
    }
}

/// A backend binding.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn login(&self, credentials: &Credentials) -> Result<Session, CoreError>;

    /// Re-establish a persisted session. May hand back a refreshed one.
    async fn resume(&self, session: &Session) -> Result<Session, CoreError>;

    async fn logout(&self);

    /// Keep `resource` fresh in the store until `cancel` fires.
    fn follow(&self, resource: Resource, sink: FeedSink, cancel: CancellationToken) -> JoinHandle<()>;

    async fn create_device(&self, name: &str, secret_key: &str) -> Result<(), CoreError>;

    async fn delete_device(&self, id: &DeviceId) -> Result<(), CoreError>;

    async fn set_device_token(&self, id: &DeviceId, secret_key: &str) -> Result<(), CoreError>;

    async fn update_settings(&self, settings: &Settings) -> Result<(), CoreError>;
}

/// Build the binding `config` selects.
pub fn from_config(config: &CoreConfig) -> Result<Arc<dyn DataSource>, CoreError> {
    let transport = config.transport();
    match &config.backend {
        BackendConfig::Rest { api_url } => {
            let client = ukurair_api::RestClient::new(api_url.clone(), &transport)?;
            Ok(Arc::new(PollingSource::new(client, config.intervals)))
        }
        BackendConfig::Realtime {
            database_url,
            api_key,
            identity_url,
        } => {
            let mut rt = ukurair_api::RealtimeConfig::new(database_url.clone(), api_key.clone())?;
            if let Some(base) = identity_url {
                rt = rt.with_identity_base(base.clone());
            }
            let client = ukurair_api::RealtimeClient::new(rt, &transport)?;
            Ok(Arc::new(PushSource::new(client, config.history_limit)))
        }
    }
}
