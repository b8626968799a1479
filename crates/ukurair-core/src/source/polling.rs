// ── REST binding ──
//
// One interval timer per followed resource. Each tick spawns its read
// without waiting for the previous one, so slow responses can overlap;
// the feed sink's tickets decide which result wins.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use ukurair_api::RestClient;

use super::{DataSource, Resource};
use crate::config::PollIntervals;
use crate::convert;
use crate::error::CoreError;
use crate::feed::FeedSink;
use crate::model::{BackendKind, Credentials, DeviceId, Session, Settings};
use crate::store::FeedData;

/// Polls the REST API.
pub struct PollingSource {
    client: Arc<RestClient>,
    intervals: PollIntervals,
}

impl PollingSource {
    pub fn new(client: RestClient, intervals: PollIntervals) -> Self {
        Self {
            client: Arc::new(client),
            intervals,
        }
    }

    pub fn client(&self) -> &RestClient {
        &self.client
    }
}

/// Timer period for `resource`.
fn period(intervals: &PollIntervals, resource: &Resource) -> Duration {
    match resource {
        Resource::Dashboard => intervals.dashboard,
        Resource::Devices | Resource::Settings | Resource::Stats | Resource::Trend(_) => intervals.admin,
        Resource::History(_) => intervals.history,
    }
}

/// One read of `resource`, converted.
async fn fetch(client: &RestClient, resource: &Resource) -> Result<FeedData, CoreError> {
    Ok(match resource {
        Resource::Dashboard => FeedData::Dashboard(convert::dashboard_from_rest(client.dashboard().await?)),
        Resource::Devices => FeedData::Devices(convert::devices_from_rest(client.devices().await?)),
        Resource::Settings => FeedData::Settings(convert::settings_from_rest(client.settings().await?)),
        Resource::Stats => FeedData::Stats(convert::stats_from_rest(client.admin_stats().await?)),
        Resource::History(id) | Resource::Trend(id) => {
            let rows = client.device_history(id.as_str()).await?;
            FeedData::History(id.clone(), convert::history_from_rest(id, rows))
        }
    })
}

#[async_trait]
impl DataSource for PollingSource {
    fn kind(&self) -> BackendKind {
        BackendKind::Rest
    }

    async fn login(&self, credentials: &Credentials) -> Result<Session, CoreError> {
        let login = self
            .client
            .login(&credentials.username, &credentials.password)
            .await?;
        Ok(Session {
            token: login.token,
            refresh_token: None,
            user: convert::user_from_rest(login.user),
            backend: BackendKind::Rest,
            issued_at: Utc::now(),
        })
    }

    async fn resume(&self, session: &Session) -> Result<Session, CoreError> {
        // The API has no introspection endpoint; a dead token surfaces as
        // `SessionExpired` on the first authenticated read.
        self.client.resume(session.token.clone());
        Ok(session.clone())
    }

    async fn logout(&self) {
        self.client.logout();
    }

    fn follow(&self, resource: Resource, sink: FeedSink, cancel: CancellationToken) -> JoinHandle<()> {
        let client = Arc::clone(&self.client);
        let period = period(&self.intervals, &resource);

        tokio::spawn(async move {
            debug!(%resource, ?period, "polling started");
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let ticket = sink.ticket();
                        let client = Arc::clone(&client);
                        let sink = sink.clone();
                        let resource = resource.clone();
                        // Detached: an in-flight read is never aborted, its
                        // result is simply dropped if the view moved on.
                        tokio::spawn(async move {
                            match fetch(&client, &resource).await {
                                Ok(data) => {
                                    sink.apply(ticket, data);
                                }
                                Err(e) => sink.fail(ticket, &e),
                            }
                        });
                    }
                }
            }
            debug!(%resource, "polling stopped");
        })
    }

    async fn create_device(&self, name: &str, secret_key: &str) -> Result<(), CoreError> {
        Ok(self.client.create_device(name, secret_key).await?)
    }

    async fn delete_device(&self, id: &DeviceId) -> Result<(), CoreError> {
        Ok(self.client.delete_device(id.as_str()).await?)
    }

    async fn set_device_token(&self, id: &DeviceId, secret_key: &str) -> Result<(), CoreError> {
        Ok(self.client.update_device_token(id.as_str(), secret_key).await?)
    }

    async fn update_settings(&self, settings: &Settings) -> Result<(), CoreError> {
        Ok(self.client.update_settings(&settings.global_api_key).await?)
    }
}
