// Realtime database domain writes
//
// The admin UI keeps `devices/{id}` and its `dashboard/{id}` snapshot in
// step, so every device mutation is one multi-path update.

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::Error;
use crate::realtime::client::RealtimeClient;
use crate::realtime::models::paths;

/// Server-side timestamp placeholder.
fn server_timestamp() -> Value {
    json!({ ".sv": "timestamp" })
}

impl RealtimeClient {
    /// Write a new device record and its zeroed dashboard snapshot.
    pub async fn create_device(&self, id: &str, name: &str, secret_key: &str) -> Result<(), Error> {
        debug!(id, name, "creating device");
        let mut changes = Map::new();
        changes.insert(
            format!("{}/{id}", paths::DEVICES),
            json!({
                "name": name,
                "secret_key": secret_key,
                "created_at": server_timestamp(),
            }),
        );
        changes.insert(
            format!("{}/{id}", paths::DASHBOARD),
            json!({
                "name": name,
                "secret_key": secret_key,
                "water_level": 0,
                "status": "AMAN",
            }),
        );
        self.update(changes).await
    }

    /// Remove a device, its snapshot and its whole measurement history.
    pub async fn delete_device(&self, id: &str) -> Result<(), Error> {
        debug!(id, "deleting device");
        let mut changes = Map::new();
        changes.insert(format!("{}/{id}", paths::DEVICES), Value::Null);
        changes.insert(format!("{}/{id}", paths::DASHBOARD), Value::Null);
        changes.insert(paths::measurements(id), Value::Null);
        self.update(changes).await
    }

    /// Overwrite a device's secret token in both places it is stored.
    pub async fn update_device_token(&self, id: &str, secret_key: &str) -> Result<(), Error> {
        debug!(id, "updating device token");
        let mut changes = Map::new();
        changes.insert(
            format!("{}/{id}/secret_key", paths::DEVICES),
            Value::String(secret_key.to_owned()),
        );
        changes.insert(
            format!("{}/{id}/secret_key", paths::DASHBOARD),
            Value::String(secret_key.to_owned()),
        );
        self.update(changes).await
    }

    /// Overwrite the global settings record.
    pub async fn update_settings(&self, global_api_key: &str) -> Result<(), Error> {
        self.put(paths::SETTINGS, &json!({ "global_api_key": global_api_key }))
            .await
    }
}
