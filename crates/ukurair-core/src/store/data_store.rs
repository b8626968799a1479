// ── Reactive data store ──
//
// One `watch` channel per state slice. Feeds replace whole slices
// (no deltas); deleted device ids are tombstoned so a read that was in
// flight during the delete cannot bring them back. A tombstone is dropped
// once both the dashboard and the device list have come back without it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::{AdminStats, DashboardEntry, Device, DeviceId, Measurement, Settings};
use crate::stream::SliceStream;

pub type Histories = HashMap<DeviceId, Arc<Vec<Measurement>>>;

/// A full-value update for one slice.
#[derive(Debug, Clone)]
pub enum FeedData {
    Dashboard(Vec<DashboardEntry>),
    Devices(Vec<Device>),
    Settings(Settings),
    Stats(AdminStats),
    History(DeviceId, Vec<Measurement>),
}

/// Listings a deletion must drop out of before its tombstone goes.
#[derive(Debug, Default)]
struct Unconfirmed {
    dashboard_gone: bool,
    devices_gone: bool,
}

#[derive(Debug, Clone, Copy)]
enum Listing {
    Dashboard,
    Devices,
}

impl Unconfirmed {
    /// Record that `listing` no longer carries the id. `true` once both do.
    fn confirm(&mut self, listing: Listing) -> bool {
        match listing {
            Listing::Dashboard => self.dashboard_gone = true,
            Listing::Devices => self.devices_gone = true,
        }
        self.dashboard_gone && self.devices_gone
    }
}

/// Shared in-memory state tree.
pub struct DataStore {
    dashboard: watch::Sender<Arc<Vec<DashboardEntry>>>,
    devices: watch::Sender<Arc<Vec<Device>>>,
    settings: watch::Sender<Option<Arc<Settings>>>,
    stats: watch::Sender<Option<Arc<AdminStats>>>,

    /// Per-device history, ascending.
    histories: DashMap<DeviceId, Arc<Vec<Measurement>>>,
    /// Full history snapshot, rebuilt on mutation.
    history_snapshot: watch::Sender<Arc<Histories>>,

    tombstones: DashMap<DeviceId, Unconfirmed>,
    last_update: watch::Sender<Option<DateTime<Utc>>>,
}

impl DataStore {
    pub fn new() -> Self {
        let (dashboard, _) = watch::channel(Arc::new(Vec::new()));
        let (devices, _) = watch::channel(Arc::new(Vec::new()));
        let (settings, _) = watch::channel(None);
        let (stats, _) = watch::channel(None);
        let (history_snapshot, _) = watch::channel(Arc::new(HashMap::new()));
        let (last_update, _) = watch::channel(None);

        Self {
            dashboard,
            devices,
            settings,
            stats,
            histories: DashMap::new(),
            history_snapshot,
            tombstones: DashMap::new(),
            last_update,
        }
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Replace the slice `data` addresses.
    pub(crate) fn apply(&self, data: FeedData) {
        match data {
            // Filtering happens under the channel lock so it serializes
            // with `forget_device`.
            FeedData::Dashboard(mut entries) => {
                self.dashboard.send_modify(|s| {
                    self.settle_tombstones(Listing::Dashboard, |id| entries.iter().any(|e| e.id == *id));
                    entries.retain(|e| !self.tombstones.contains_key(&e.id));
                    *s = Arc::new(entries);
                });
            }
            FeedData::Devices(mut devices) => {
                self.devices.send_modify(|s| {
                    self.settle_tombstones(Listing::Devices, |id| devices.iter().any(|d| d.id == *id));
                    devices.retain(|d| !self.tombstones.contains_key(&d.id));
                    *s = Arc::new(devices);
                });
            }
            FeedData::Settings(settings) => {
                self.settings.send_modify(|s| *s = Some(Arc::new(settings)));
            }
            FeedData::Stats(stats) => {
                self.stats.send_modify(|s| *s = Some(Arc::new(stats)));
            }
            FeedData::History(id, history) => {
                if self.tombstones.contains_key(&id) {
                    return;
                }
                self.histories.insert(id.clone(), Arc::new(history));
                // Lost a race with `forget_device`.
                if self.tombstones.contains_key(&id) {
                    self.histories.remove(&id);
                }
                self.rebuild_histories();
            }
        }
        self.last_update.send_modify(|t| *t = Some(Utc::now()));
    }

    /// Drop a deleted device from every slice and refuse it from now on.
    pub fn forget_device(&self, id: &DeviceId) {
        self.tombstones.insert(id.clone(), Unconfirmed::default());
        self.dashboard.send_if_modified(|s| retain_arc(s, |e| e.id != *id));
        self.devices.send_if_modified(|s| retain_arc(s, |d| d.id != *id));
        if self.histories.remove(id).is_some() {
            self.rebuild_histories();
        }
    }

    /// Keep only the histories `keep` accepts.
    pub(crate) fn retain_histories(&self, keep: impl Fn(&DeviceId) -> bool) {
        let before = self.histories.len();
        self.histories.retain(|id, _| keep(id));
        if self.histories.len() != before {
            self.rebuild_histories();
        }
    }

    /// Forget everything only an admin may see.
    pub fn clear_admin(&self) {
        self.devices.send_modify(|s| *s = Arc::new(Vec::new()));
        self.settings.send_modify(|s| *s = None);
        self.stats.send_modify(|s| *s = None);
        self.histories.clear();
        self.rebuild_histories();
    }

    // ── Snapshots ────────────────────────────────────────────────────

    pub fn dashboard(&self) -> Arc<Vec<DashboardEntry>> {
        self.dashboard.borrow().clone()
    }

    pub fn dashboard_entry(&self, id: &DeviceId) -> Option<DashboardEntry> {
        self.dashboard.borrow().iter().find(|e| e.id == *id).cloned()
    }

    pub fn devices(&self) -> Arc<Vec<Device>> {
        self.devices.borrow().clone()
    }

    pub fn device(&self, id: &DeviceId) -> Option<Device> {
        self.devices.borrow().iter().find(|d| d.id == *id).cloned()
    }

    pub fn settings(&self) -> Option<Arc<Settings>> {
        self.settings.borrow().clone()
    }

    pub fn stats(&self) -> Option<Arc<AdminStats>> {
        self.stats.borrow().clone()
    }

    pub fn history(&self, id: &DeviceId) -> Option<Arc<Vec<Measurement>>> {
        self.histories.get(id).map(|h| Arc::clone(h.value()))
    }

    pub fn histories(&self) -> Arc<Histories> {
        self.history_snapshot.borrow().clone()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.borrow()
    }

    pub fn is_tombstoned(&self, id: &DeviceId) -> bool {
        self.tombstones.contains_key(id)
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_dashboard(&self) -> SliceStream<Arc<Vec<DashboardEntry>>> {
        SliceStream::new(self.dashboard.subscribe())
    }

    pub fn subscribe_devices(&self) -> SliceStream<Arc<Vec<Device>>> {
        SliceStream::new(self.devices.subscribe())
    }

    pub fn subscribe_settings(&self) -> SliceStream<Option<Arc<Settings>>> {
        SliceStream::new(self.settings.subscribe())
    }

    pub fn subscribe_stats(&self) -> SliceStream<Option<Arc<AdminStats>>> {
        SliceStream::new(self.stats.subscribe())
    }

    pub fn subscribe_histories(&self) -> SliceStream<Arc<Histories>> {
        SliceStream::new(self.history_snapshot.subscribe())
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// A full read of `listing` arrived; `listed` says which ids it carried.
    fn settle_tombstones(&self, listing: Listing, listed: impl Fn(&DeviceId) -> bool) {
        self.tombstones
            .retain(|id, pending| listed(id) || !pending.confirm(listing));
    }

    fn rebuild_histories(&self) {
        let snapshot: Histories = self
            .histories
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        self.history_snapshot.send_modify(|s| *s = Arc::new(snapshot));
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Filter an `Arc<Vec<T>>` in place; `true` if anything was removed.
fn retain_arc<T: Clone>(slot: &mut Arc<Vec<T>>, keep: impl Fn(&T) -> bool) -> bool {
    if slot.iter().all(&keep) {
        return false;
    }
    let kept: Vec<T> = slot.iter().filter(|x| keep(x)).cloned().collect();
    *slot = Arc::new(kept);
    true
}
