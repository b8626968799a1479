// ── Feed sequencing ──
//
// Every read a data source issues carries a ticket `(epoch, seq)`. The
// result is applied only if the ticket's epoch is still current and its
// seq is newer than the last one applied for that feed. Late results from
// a view the user already left, and results overtaken by a newer read,
// are dropped.
//
// Epoch bumps take the write half of the clock's lock and applies take the
// read half, so once `advance` returns no result from the old epoch can
// still land in the store.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::source::Resource;
use crate::store::{DataStore, FeedData};

/// Which epoch a feed is tied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedScope {
    /// The always-on public dashboard. Its epoch changes only on shutdown.
    Dashboard,
    /// Feeds owned by the current screen.
    View,
}

/// Notifications from feeds to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSignal {
    /// The first read of a feed completed, successfully or not.
    Settled(Resource),
    /// The backend rejected the session.
    Expired,
}

// ── EpochClock ───────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
struct Epochs {
    dashboard: u64,
    view: u64,
}

#[derive(Debug, Default)]
pub(crate) struct EpochClock {
    epochs: RwLock<Epochs>,
}

impl EpochClock {
    pub(crate) fn current(&self, scope: FeedScope) -> u64 {
        let epochs = self.epochs.read().unwrap_or_else(PoisonError::into_inner);
        match scope {
            FeedScope::Dashboard => epochs.dashboard,
            FeedScope::View => epochs.view,
        }
    }

    /// Invalidate every ticket issued under `scope`. Returns the new epoch.
    pub(crate) fn advance(&self, scope: FeedScope) -> u64 {
        let mut epochs = self.epochs.write().unwrap_or_else(PoisonError::into_inner);
        let slot = match scope {
            FeedScope::Dashboard => &mut epochs.dashboard,
            FeedScope::View => &mut epochs.view,
        };
        *slot += 1;
        *slot
    }
}

// ── Ticket / FeedSink ────────────────────────────────────────────────

/// Issued before a read, presented with its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    epoch: u64,
    seq: u64,
}

/// Where a data source delivers the results of one followed resource.
///
/// Cheap to clone; clones share the sequence counter.
#[derive(Clone)]
pub struct FeedSink {
    inner: Arc<SinkInner>,
}

struct SinkInner {
    resource: Resource,
    scope: FeedScope,
    epoch: u64,
    next_seq: AtomicU64,
    last_applied: Mutex<u64>,
    settled: AtomicBool,
    clock: Arc<EpochClock>,
    store: Arc<DataStore>,
    signals: mpsc::UnboundedSender<FeedSignal>,
}

impl FeedSink {
    pub(crate) fn new(
        resource: Resource,
        clock: Arc<EpochClock>,
        store: Arc<DataStore>,
        signals: mpsc::UnboundedSender<FeedSignal>,
    ) -> Self {
        let scope = resource.scope();
        let epoch = clock.current(scope);
        Self {
            inner: Arc::new(SinkInner {
                resource,
                scope,
                epoch,
                next_seq: AtomicU64::new(0),
                last_applied: Mutex::new(0),
                settled: AtomicBool::new(false),
                clock,
                store,
                signals,
            }),
        }
    }

    pub fn resource(&self) -> &Resource {
        &self.inner.resource
    }

    /// Take a ticket for a read about to be issued.
    pub fn ticket(&self) -> Ticket {
        Ticket {
            epoch: self.inner.epoch,
            seq: self.inner.next_seq.fetch_add(1, Ordering::Relaxed) + 1,
        }
    }

    /// Whether tickets from this sink can still be applied.
    pub fn is_current(&self) -> bool {
        self.inner.clock.current(self.inner.scope) == self.inner.epoch
    }

    /// Store `data` unless the ticket is stale. Returns whether it was applied.
    pub fn apply(&self, ticket: Ticket, data: FeedData) -> bool {
        let inner = &*self.inner;
        let applied = {
            let epochs = inner.clock.epochs.read().unwrap_or_else(PoisonError::into_inner);
            let current = match inner.scope {
                FeedScope::Dashboard => epochs.dashboard,
                FeedScope::View => epochs.view,
            };
            if ticket.epoch == current {
                let mut last = inner.last_applied.lock().unwrap_or_else(PoisonError::into_inner);
                if ticket.seq > *last {
                    *last = ticket.seq;
                    inner.store.apply(data);
                    true
                } else {
                    debug!(resource = %inner.resource, seq = ticket.seq, last = *last, "dropping overtaken result");
                    false
                }
            } else {
                debug!(resource = %inner.resource, epoch = ticket.epoch, current, "dropping result from previous view");
                false
            }
        };
        self.settle();
        applied
    }

    /// Report a failed read. Stale data stays on screen; an expired
    /// session is escalated to the controller.
    pub fn fail(&self, ticket: Ticket, err: &CoreError) {
        let inner = &*self.inner;
        if ticket.epoch != inner.clock.current(inner.scope) {
            debug!(resource = %inner.resource, error = %err, "ignoring failure from previous view");
            return;
        }
        if err.is_session_expired() {
            warn!(resource = %inner.resource, "session rejected by backend");
            let _ = inner.signals.send(FeedSignal::Expired);
        } else {
            warn!(resource = %inner.resource, error = %err, "read failed; keeping last data");
        }
        self.settle();
    }

    pub(crate) fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    fn settle(&self) {
        if !self.inner.settled.swap(true, Ordering::Relaxed) {
            let _ = self.inner.signals.send(FeedSignal::Settled(self.inner.resource.clone()));
        }
    }
}
