//! All possible UI actions. Actions are the sole mechanism for state mutation.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::SecretString;

use ukurair_core::{AdminStats, DashboardEntry, Device, DeviceId, Histories, Settings, ViewState};

/// Notification severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// A toast notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn success(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Success,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Error,
        }
    }

    pub fn info(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Info,
        }
    }
}

/// Pending confirmation action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    DeleteDevice { id: DeviceId, name: String },
    ResetToken { id: DeviceId, name: String },
}

impl fmt::Display for ConfirmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeleteDevice { name, .. } => {
                write!(f, "Hapus {name} beserta seluruh riwayatnya?")
            }
            Self::ResetToken { name, .. } => write!(f, "Buat token baru untuk {name}?"),
        }
    }
}

/// Every state transition in the TUI is expressed as an Action.
#[derive(Debug, Clone)]
pub enum Action {
    // ── Lifecycle ──────────────────────────────────────────────────
    Quit,
    Tick,
    Render,
    Resize(u16, u16),

    // ── Data Events (from the controller and its store) ───────────
    ViewChanged(ViewState),
    /// Signed-in user's display name, `None` when signed out.
    SessionChanged(Option<String>),
    DashboardUpdated(Arc<Vec<DashboardEntry>>),
    DevicesUpdated(Arc<Vec<Device>>),
    SettingsUpdated(Option<Arc<Settings>>),
    StatsUpdated(Option<Arc<AdminStats>>),
    HistoriesUpdated(Arc<Histories>),
    LastUpdate(Option<DateTime<Utc>>),

    // ── Navigation intents ────────────────────────────────────────
    OpenDevice(DeviceId),
    ShowDashboard,
    RequestAdmin,

    // ── Authentication ────────────────────────────────────────────
    Login {
        username: String,
        password: SecretString,
    },
    LoginFinished,
    Logout,

    // ── Admin commands ────────────────────────────────────────────
    CreateDevice { name: String, secret_key: String },
    RequestDelete(DeviceId),
    RequestResetToken(DeviceId),
    UpdateSettings(String),
    /// A form submission succeeded; the open form can close.
    FormAccepted,
    /// A token reset finished with this new token.
    TokenIssued { id: DeviceId, token: String },

    // ── Confirm Dialog ────────────────────────────────────────────
    ShowConfirm(ConfirmAction),
    ConfirmYes,
    ConfirmNo,

    // ── Help ──────────────────────────────────────────────────────
    ToggleHelp,

    // ── Notifications ─────────────────────────────────────────────
    Notify(Notification),
}
