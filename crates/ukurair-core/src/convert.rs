// ── Wire → domain conversions ──
//
// Both bindings land here. History conversions always return readings in
// ascending time order: the REST API answers newest-first, the realtime
// database in push-key order.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use ukurair_api::realtime::models::{
    self as rt, DashboardNode, DeviceNode, MeasurementNode, SettingsNode,
};
use ukurair_api::rest::models::{
    AdminStatsRecord, DashboardRecord, DeviceRecord, MeasurementRecord, SettingsRecord, UserRecord,
};

use crate::model::{
    AdminStats, DashboardEntry, Device, DeviceId, Measurement, Settings, StatusCount, UserProfile,
    WaterStatus,
};

/// Sort readings oldest-first. Stable; readings without a timestamp keep
/// their relative order ahead of timestamped ones.
pub fn sort_history(history: &mut [Measurement]) {
    history.sort_by_key(|m| m.created_at);
}

// ── REST ────────────────────────────────────────────────────────────

pub fn dashboard_from_rest(rows: Vec<DashboardRecord>) -> Vec<DashboardEntry> {
    rows.into_iter()
        .map(|r| DashboardEntry {
            name: r.name.unwrap_or_else(|| r.id.clone()),
            id: DeviceId::from(r.id),
            water_level_cm: r.water_level,
            status: WaterStatus::from_wire(r.status.as_deref()),
            updated_at: r.created_at,
        })
        .collect()
}

pub fn devices_from_rest(rows: Vec<DeviceRecord>) -> Vec<Device> {
    rows.into_iter()
        .map(|r| Device {
            name: r.name.unwrap_or_else(|| r.id.clone()),
            id: DeviceId::from(r.id),
            secret_key: r.secret_key.unwrap_or_default(),
            created_at: r.created_at,
        })
        .collect()
}

pub fn history_from_rest(id: &DeviceId, rows: Vec<MeasurementRecord>) -> Vec<Measurement> {
    let mut history: Vec<Measurement> = rows
        .into_iter()
        .rev()
        .map(|r| Measurement {
            device_id: r.device_id.map_or_else(|| id.clone(), DeviceId::from),
            water_level_cm: r.water_level,
            status: WaterStatus::from_wire(r.status.as_deref()),
            created_at: r.created_at,
        })
        .collect();
    sort_history(&mut history);
    history
}

pub fn settings_from_rest(record: SettingsRecord) -> Settings {
    Settings {
        global_api_key: record.global_api_key.unwrap_or_default(),
    }
}

pub fn stats_from_rest(record: AdminStatsRecord) -> AdminStats {
    AdminStats {
        total_devices: record.total_devices,
        total_measurements: record.total_measurements,
        status_counts: record
            .status_counts
            .into_iter()
            .map(|c| StatusCount {
                status: WaterStatus::from_wire(c.status.as_deref()),
                count: c.count,
            })
            .collect(),
    }
}

pub fn user_from_rest(record: UserRecord) -> UserProfile {
    UserProfile {
        id: record.id,
        username: record.username,
        email: record.email,
        role: record.role,
    }
}

// ── Realtime database ───────────────────────────────────────────────

pub fn dashboard_from_tree(tree: &Value) -> Vec<DashboardEntry> {
    rt::children::<DashboardNode>(tree)
        .into_iter()
        .map(|(key, node)| DashboardEntry {
            name: node.name.unwrap_or_else(|| key.clone()),
            id: DeviceId::from(key),
            water_level_cm: node.water_level,
            status: WaterStatus::from_wire(node.status.as_deref()),
            updated_at: node.created_at,
        })
        .collect()
}

pub fn devices_from_tree(tree: &Value) -> Vec<Device> {
    rt::children::<DeviceNode>(tree)
        .into_iter()
        .map(|(key, node)| Device {
            name: node.name.unwrap_or_else(|| key.clone()),
            id: DeviceId::from(key),
            secret_key: node.secret_key.unwrap_or_default(),
            created_at: node.created_at,
        })
        .collect()
}

pub fn history_from_tree(id: &DeviceId, tree: &Value) -> Vec<Measurement> {
    let mut history: Vec<Measurement> = rt::children::<MeasurementNode>(tree)
        .into_iter()
        .map(|(_, node)| Measurement {
            device_id: id.clone(),
            water_level_cm: node.water_level,
            status: WaterStatus::from_wire(node.status.as_deref()),
            created_at: node.created_at,
        })
        .collect();
    sort_history(&mut history);
    history
}

pub fn settings_from_tree(tree: &Value) -> Settings {
    let node: SettingsNode = rt::node(tree).unwrap_or_default();
    Settings {
        global_api_key: node.global_api_key.unwrap_or_default(),
    }
}

/// Statistics computed from what the client holds: the device list and
/// the bounded per-device histories.
pub fn stats_from_local(
    devices: &[Device],
    histories: &HashMap<DeviceId, Arc<Vec<Measurement>>>,
) -> AdminStats {
    let mut counts: Vec<StatusCount> = [WaterStatus::Safe, WaterStatus::Watch, WaterStatus::Emergency]
        .into_iter()
        .map(|status| StatusCount { status, count: 0 })
        .collect();
    let mut total: u64 = 0;

    for device in devices {
        let Some(history) = histories.get(&device.id) else {
            continue;
        };
        for reading in history.iter() {
            total += 1;
            if let Some(slot) = counts.iter_mut().find(|c| c.status == reading.status) {
                slot.count += 1;
            }
        }
    }

    AdminStats {
        total_devices: u64::try_from(devices.len()).unwrap_or(u64::MAX),
        total_measurements: total,
        status_counts: counts,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rest_history(rows: Value) -> Vec<MeasurementRecord> {
        serde_json::from_value(rows).unwrap()
    }

    fn is_ascending(history: &[Measurement]) -> bool {
        history.windows(2).all(|w| w[0].created_at <= w[1].created_at)
    }

    #[test]
    fn rest_history_is_reversed_to_ascending() {
        let id = DeviceId::from("7");
        let history = history_from_rest(
            &id,
            rest_history(json!([
                { "water_level": 30, "status": "SIAGA", "created_at": "2024-01-01T00:00:20Z" },
                { "water_level": 20, "status": "AMAN", "created_at": "2024-01-01T00:00:10Z" },
                { "water_level": 10, "status": "AMAN", "created_at": "2024-01-01T00:00:00Z" }
            ])),
        );
        let levels: Vec<f64> = history.iter().map(|m| m.water_level_cm).collect();
        assert_eq!(levels, vec![10.0, 20.0, 30.0]);
        assert!(is_ascending(&history));
        assert_eq!(history[0].device_id, id);
    }

    #[test]
    fn out_of_order_history_is_sorted() {
        let id = DeviceId::from("7");
        let history = history_from_rest(
            &id,
            rest_history(json!([
                { "water_level": 2, "created_at": "2024-01-01T00:00:05Z" },
                { "water_level": 3, "created_at": "2024-01-01T00:00:09Z" },
                { "water_level": 1, "created_at": "2024-01-01T00:00:01Z" }
            ])),
        );
        assert!(is_ascending(&history));
    }

    #[test]
    fn tree_history_follows_timestamps_not_keys() {
        let id = DeviceId::from("a");
        let tree = json!({
            "-A": { "water_level": 5, "created_at": 1_704_067_260_000_i64 },
            "-B": { "water_level": 4, "created_at": 1_704_067_200_000_i64 }
        });
        let history = history_from_tree(&id, &tree);
        assert_eq!(
            history[0].created_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert!(is_ascending(&history));
    }

    #[test]
    fn dashboard_scenario_row() {
        let rows: Vec<DashboardRecord> = serde_json::from_value(json!([{
            "id": "a", "name": "Gate A", "water_level": 42, "status": "SIAGA",
            "created_at": "2024-01-01T00:00:00Z"
        }]))
        .unwrap();
        let entries = dashboard_from_rest(rows);
        assert_eq!(entries[0].id, DeviceId::from("a"));
        assert_eq!(entries[0].status, WaterStatus::Watch);
        assert!((entries[0].water_level_cm - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn dashboard_tree_defaults() {
        let entries = dashboard_from_tree(&json!({ "dev-1": { "name": "Gate A" } }));
        assert_eq!(entries[0].status, WaterStatus::Safe);
        assert!(entries[0].water_level_cm.abs() < f64::EPSILON);
        assert!(entries[0].updated_at.is_none());
    }

    #[test]
    fn local_stats_count_held_histories() {
        let a = DeviceId::from("a");
        let devices = vec![Device {
            id: a.clone(),
            name: "Gate A".into(),
            secret_key: "K".into(),
            created_at: None,
        }];
        let reading = |status| Measurement {
            device_id: a.clone(),
            water_level_cm: 1.0,
            status,
            created_at: None,
        };
        let mut histories = HashMap::new();
        histories.insert(
            a.clone(),
            Arc::new(vec![
                reading(WaterStatus::Safe),
                reading(WaterStatus::Watch),
                reading(WaterStatus::Emergency),
            ]),
        );
        // History of a device no longer listed is ignored.
        histories.insert(DeviceId::from("gone"), Arc::new(vec![reading(WaterStatus::Watch)]));

        let stats = stats_from_local(&devices, &histories);
        assert_eq!(stats.total_devices, 1);
        assert_eq!(stats.total_measurements, 3);
        assert_eq!(stats.alert_count(), 2);
    }
}
