// REST API device and dashboard endpoints
//
// Public reads (dashboard, per-device history) and the authenticated
// device mutations.

use tracing::debug;

use crate::error::Error;
use crate::rest::client::{Auth, RestClient};
use crate::rest::models::{
    CreateDeviceRequest, DashboardRecord, DeviceRecord, MeasurementRecord, UpdateTokenRequest,
};

impl RestClient {
    // ── Public reads ─────────────────────────────────────────────────

    /// Latest reading per device.
    pub async fn dashboard(&self) -> Result<Vec<DashboardRecord>, Error> {
        self.get(&["dashboard"], Auth::Public).await
    }

    /// Measurement history for a device, as returned by the server
    /// (newest first).
    pub async fn device_history(&self, id: &str) -> Result<Vec<MeasurementRecord>, Error> {
        self.get(&["devices", id, "history"], Auth::Public).await
    }

    // ── Authenticated ────────────────────────────────────────────────

    /// All registered devices with their secret tokens.
    pub async fn devices(&self) -> Result<Vec<DeviceRecord>, Error> {
        self.get(&["devices"], Auth::Bearer).await
    }

    /// Register a device. The server assigns the id.
    pub async fn create_device(&self, name: &str, secret_key: &str) -> Result<(), Error> {
        debug!(name, "creating device");
        let body = CreateDeviceRequest { name, secret_key };
        self.post(&["devices"], &body).await
    }

    /// Delete a device. The server cascades to its snapshot and history.
    pub async fn delete_device(&self, id: &str) -> Result<(), Error> {
        debug!(id, "deleting device");
        self.delete(&["devices", id]).await
    }

    /// Replace a device's secret token.
    pub async fn update_device_token(&self, id: &str, secret_key: &str) -> Result<(), Error> {
        debug!(id, "updating device token");
        self.patch(&["devices", id], &UpdateTokenRequest { secret_key })
            .await
    }
}
