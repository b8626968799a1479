// REST API admin endpoints: settings and aggregate statistics.

use crate::error::Error;
use crate::rest::client::{Auth, RestClient};
use crate::rest::models::{AdminStatsRecord, SettingsRecord, UpdateSettingsRequest};

impl RestClient {
    /// Global ingestion settings.
    pub async fn settings(&self) -> Result<SettingsRecord, Error> {
        self.get(&["settings"], Auth::Bearer).await
    }

    /// Overwrite the global ingestion API key.
    pub async fn update_settings(&self, global_api_key: &str) -> Result<(), Error> {
        self.put(&["settings"], &UpdateSettingsRequest { global_api_key })
            .await
    }

    /// Device, measurement and per-status totals.
    pub async fn admin_stats(&self) -> Result<AdminStatsRecord, Error> {
        self.get(&["admin", "stats"], Auth::Bearer).await
    }
}
