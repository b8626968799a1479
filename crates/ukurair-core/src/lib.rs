//! Reactive state layer between `ukurair-api` and the terminal front-end.
//!
//! This crate owns the domain model, the backend bindings and the view
//! state machine of the UKURAIR water-level dashboard:
//!
//! - **[`Controller`]**: the facade. [`start()`](Controller::start)
//!   restores a persisted session and starts the public dashboard feed;
//!   navigation methods move between the dashboard, login, device-detail
//!   and admin screens and start or retire the feeds each screen needs.
//!
//! - **[`DataSource`]**: one backend binding. [`PollingSource`] polls the
//!   REST API on timers; [`PushSource`] subscribes to the realtime
//!   database. Both deliver whole-slice updates through a [`FeedSink`].
//!
//! - **[`FeedSink`]**: sequencing gate in front of the store. Every read
//!   carries a ticket; results from a screen the user already left, or
//!   overtaken by a newer read, are dropped.
//!
//! - **[`DataStore`]**: `watch`-channel slices (dashboard, devices,
//!   settings, stats, histories) with snapshot accessors and
//!   [`SliceStream`] subscriptions for rendering.
//!
//! - **Domain model** ([`model`]): `Device`, `Measurement`,
//!   `DashboardEntry`, `WaterStatus`, `Session`, `ViewState`.

pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod feed;
pub mod model;
pub mod session;
pub mod source;
pub mod store;
pub mod stream;
pub mod token;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{
    BackendConfig, CoreConfig, DEFAULT_API_URL, DEFAULT_DATABASE_URL, DEFAULT_HISTORY_LIMIT,
    PollIntervals, TlsVerification,
};
pub use controller::{
    Controller, MSG_MISSING_API_KEY, MSG_MISSING_CREDENTIALS, MSG_MISSING_NAME, MSG_MISSING_TOKEN,
};
pub use error::{CoreError, MSG_BAD_CREDENTIALS, MSG_CONNECTION_FAILED, MSG_SESSION_EXPIRED};
pub use feed::{FeedScope, FeedSignal, FeedSink, Ticket};
pub use session::SessionStore;
pub use source::{DataSource, PollingSource, PushSource, Resource};
pub use store::{DataStore, FeedData, Histories};
pub use stream::SliceStream;
pub use token::generate_device_token;

pub use model::{
    AdminStats, BackendKind, Credentials, DashboardEntry, Device, DeviceId, Measurement, Screen,
    Session, Settings, StatusCount, UserProfile, ViewState, WaterStatus,
};
