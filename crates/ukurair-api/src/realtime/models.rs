// Realtime database node shapes and identity-provider payloads
//
// Database nodes are free-form JSON written by the admin UI and by the
// ingestion firmware, so every field is optional and decoded tolerantly.

use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::wire;

// ── Database paths ───────────────────────────────────────────────────

/// Top-level node names in the realtime database.
pub mod paths {
    pub const DASHBOARD: &str = "dashboard";
    pub const DEVICES: &str = "devices";
    pub const MEASUREMENTS: &str = "measurements";
    pub const SETTINGS: &str = "settings";

    /// `measurements/{id}`
    pub fn measurements(device_id: &str) -> String {
        format!("{MEASUREMENTS}/{device_id}")
    }
}

/// Query for the newest `limit` children of a push-id keyed list.
pub fn last_entries_query(limit: usize) -> Vec<(String, String)> {
    vec![
        ("orderBy".into(), "\"$key\"".into()),
        ("limitToLast".into(), limit.to_string()),
    ]
}

// ── Database nodes ───────────────────────────────────────────────────

/// `devices/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceNode {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default, deserialize_with = "wire::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// `dashboard/{id}`: latest reading denormalized under the device name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardNode {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default, deserialize_with = "wire::level")]
    pub water_level: f64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(
        default,
        alias = "timestamp",
        alias = "updated_at",
        deserialize_with = "wire::timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

/// `measurements/{id}/{entry}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeasurementNode {
    #[serde(default, deserialize_with = "wire::level")]
    pub water_level: f64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "timestamp", deserialize_with = "wire::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// `settings`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsNode {
    #[serde(default)]
    pub global_api_key: Option<String>,
}

/// Decode the children of a keyed node, in key order.
///
/// The database renders nodes whose keys are all small integers as JSON
/// arrays (with `null` holes), so both shapes are accepted. Children that
/// do not decode are skipped.
pub fn children<T: DeserializeOwned>(value: &Value) -> Vec<(String, T)> {
    let entries: Vec<(String, &Value)> = match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().map(|(k, v)| (k.clone(), v)).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            entries
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|(key, raw)| match T::deserialize(raw) {
            Ok(node) => Some((key, node)),
            Err(e) => {
                debug!(key = %key, error = %e, "skipping undecodable child");
                None
            }
        })
        .collect()
}

/// Decode a single node, treating `null` and undecodable values as absent.
pub fn node<T: DeserializeOwned>(value: &Value) -> Option<T> {
    if value.is_null() {
        return None;
    }
    T::deserialize(value).ok()
}

// ── Identity provider ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignInRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignInResponse {
    pub id_token: String,
    pub refresh_token: String,
    #[serde(default, deserialize_with = "wire::count")]
    pub expires_in: u64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub local_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub grant_type: &'static str,
    pub refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    pub id_token: String,
    pub refresh_token: String,
    #[serde(default, deserialize_with = "wire::count")]
    pub expires_in: u64,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Tokens and profile returned by the identity provider.
#[derive(Debug, Clone)]
pub struct IdentitySession {
    pub id_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_in: Duration,
    pub email: Option<String>,
    pub local_id: Option<String>,
    pub display_name: Option<String>,
}

impl From<SignInResponse> for IdentitySession {
    fn from(r: SignInResponse) -> Self {
        Self {
            id_token: SecretString::from(r.id_token),
            refresh_token: SecretString::from(r.refresh_token),
            expires_in: Duration::from_secs(r.expires_in),
            email: r.email,
            local_id: r.local_id,
            display_name: r.display_name,
        }
    }
}
