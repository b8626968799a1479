// ── Devices, readings and snapshots ──

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// ── DeviceId ────────────────────────────────────────────────────────

/// Backend-assigned device identifier.
///
/// Numeric SQL ids and realtime-database keys are both carried as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ── WaterStatus ─────────────────────────────────────────────────────

/// Alert classification attached to every reading.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum WaterStatus {
    #[default]
    #[serde(rename = "AMAN")]
    #[strum(serialize = "AMAN")]
    Safe,
    #[serde(rename = "SIAGA")]
    #[strum(serialize = "SIAGA")]
    Watch,
    #[serde(rename = "DARURAT")]
    #[strum(serialize = "DARURAT")]
    Emergency,
}

impl WaterStatus {
    /// Parse a backend status term. Absent or unknown terms are `Safe`.
    pub fn from_wire(raw: Option<&str>) -> Self {
        raw.map(str::trim)
            .and_then(|s| s.to_ascii_uppercase().parse().ok())
            .unwrap_or_default()
    }

    /// The term shown on badges.
    pub fn label(self) -> &'static str {
        match self {
            Self::Safe => "AMAN",
            Self::Watch => "SIAGA",
            Self::Emergency => "DARURAT",
        }
    }

    pub fn is_alert(self) -> bool {
        !matches!(self, Self::Safe)
    }
}

// ── Device ──────────────────────────────────────────────────────────

/// A registered sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    /// Shared secret the sensor presents when ingesting readings.
    pub secret_key: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// One water-level reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub device_id: DeviceId,
    pub water_level_cm: f64,
    pub status: WaterStatus,
    pub created_at: Option<DateTime<Utc>>,
}

/// Latest reading per device, denormalized under the device name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardEntry {
    pub id: DeviceId,
    pub name: String,
    pub water_level_cm: f64,
    pub status: WaterStatus,
    pub updated_at: Option<DateTime<Utc>>,
}
