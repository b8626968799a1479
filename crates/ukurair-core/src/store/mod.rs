// ── Reactive data store ──
//
// Whole-slice storage with push-based change notification.

mod data_store;

pub use data_store::{DataStore, FeedData, Histories};
