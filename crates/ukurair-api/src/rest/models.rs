// REST API request/response types
//
// Field presence varies with the backend's SQL projections, so optional
// fields use `#[serde(default)]` and the tolerant decoders in `wire`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wire;

// ── Public reads ─────────────────────────────────────────────────────

/// One row of `GET /dashboard`: the latest reading denormalized under the
/// device name.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardRecord {
    #[serde(deserialize_with = "wire::id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "wire::level")]
    pub water_level: f64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "wire::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One row of `GET /devices/{id}/history`.
#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementRecord {
    #[serde(default, deserialize_with = "wire::id_opt")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "wire::id_opt")]
    pub device_id: Option<String>,
    #[serde(default, deserialize_with = "wire::level")]
    pub water_level: f64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "wire::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

// ── Admin reads ──────────────────────────────────────────────────────

/// One row of `GET /devices`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRecord {
    #[serde(deserialize_with = "wire::id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default, deserialize_with = "wire::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// `GET /settings`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsRecord {
    #[serde(default)]
    pub global_api_key: Option<String>,
}

/// `GET /admin/stats`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminStatsRecord {
    #[serde(default, deserialize_with = "wire::count")]
    pub total_devices: u64,
    #[serde(default, deserialize_with = "wire::count")]
    pub total_measurements: u64,
    #[serde(default)]
    pub status_counts: Vec<StatusCountRecord>,
}

/// One entry of `status_counts`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusCountRecord {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "wire::count")]
    pub count: u64,
}

// ── Auth ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// `POST /auth/login` success body.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<UserRecord>,
}

/// User profile returned with a login. Only the fields the UI shows are
/// modelled; everything else lands in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, deserialize_with = "wire::id_opt")]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Mutations ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct CreateDeviceRequest<'a> {
    pub name: &'a str,
    pub secret_key: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateTokenRequest<'a> {
    pub secret_key: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateSettingsRequest<'a> {
    pub global_api_key: &'a str,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dashboard_record_from_sql_row() {
        let row: DashboardRecord = serde_json::from_value(json!({
            "id": 3,
            "name": "Pintu Air Manggarai",
            "water_level": "87.25",
            "status": "DARURAT",
            "created_at": "2024-03-01T10:00:00.000Z"
        }))
        .unwrap();

        assert_eq!(row.id, "3");
        assert!((row.water_level - 87.25).abs() < f64::EPSILON);
        assert_eq!(row.status.as_deref(), Some("DARURAT"));
        assert!(row.created_at.is_some());
    }

    #[test]
    fn dashboard_record_for_device_without_readings() {
        let row: DashboardRecord = serde_json::from_value(json!({
            "id": "b",
            "name": "Gate B",
            "water_level": null,
            "status": null,
            "created_at": null
        }))
        .unwrap();

        assert!(row.water_level.abs() < f64::EPSILON);
        assert!(row.status.is_none());
        assert!(row.created_at.is_none());
    }

    #[test]
    fn stats_counts_may_be_strings() {
        // COUNT(*) comes back as a string from some SQL drivers.
        let stats: AdminStatsRecord = serde_json::from_value(json!({
            "total_devices": "4",
            "total_measurements": 1200,
            "status_counts": [
                { "status": "SIAGA", "count": "10" },
                { "status": "DARURAT", "count": 2 }
            ]
        }))
        .unwrap();

        assert_eq!(stats.total_devices, 4);
        assert_eq!(stats.total_measurements, 1200);
        assert_eq!(stats.status_counts[0].count, 10);
        assert_eq!(stats.status_counts[1].count, 2);
    }

    #[test]
    fn user_record_keeps_unknown_fields() {
        let user: UserRecord = serde_json::from_value(json!({
            "id": 1,
            "username": "admin",
            "created_at": "2024-01-01"
        }))
        .unwrap();

        assert_eq!(user.id.as_deref(), Some("1"));
        assert_eq!(user.username.as_deref(), Some("admin"));
        assert!(user.extra.contains_key("created_at"));
    }
}
