// ── Admin-only records ──

use serde::{Deserialize, Serialize};

use super::WaterStatus;

/// Global ingestion settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub global_api_key: String,
}

/// Reading count for one status class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: WaterStatus,
    pub count: u64,
}

/// Aggregate figures for the admin panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_devices: u64,
    pub total_measurements: u64,
    pub status_counts: Vec<StatusCount>,
}

impl AdminStats {
    pub fn count_for(&self, status: WaterStatus) -> u64 {
        self.status_counts
            .iter()
            .filter(|c| c.status == status)
            .map(|c| c.count)
            .sum()
    }

    /// Readings classified SIAGA or DARURAT.
    pub fn alert_count(&self) -> u64 {
        self.count_for(WaterStatus::Watch) + self.count_for(WaterStatus::Emergency)
    }
}
