// ── Core error types ──
//
// User-facing errors from ukurair-core. Consumers never see HTTP status
// codes or JSON parse failures directly; the `From<ukurair_api::Error>`
// impl translates transport-layer errors into this taxonomy and
// `user_message()` renders the text shown on screen.

use thiserror::Error;

use crate::model::Screen;

/// Shown inline on the login form for rejected credentials.
pub const MSG_BAD_CREDENTIALS: &str = "Username atau Password salah.";
/// Shown for any failure to reach the backend.
pub const MSG_CONNECTION_FAILED: &str = "Koneksi gagal.";
/// Shown on the login form after a forced logout.
pub const MSG_SESSION_EXPIRED: &str = "Sesi berakhir. Silakan login kembali.";

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("{msg}", msg = MSG_BAD_CREDENTIALS)]
    AuthenticationFailed { message: String },

    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    #[error("Not signed in")]
    NotAuthenticated,

    // ── Connectivity ─────────────────────────────────────────────────
    #[error("{msg} ({reason})", msg = MSG_CONNECTION_FAILED)]
    Network { reason: String },

    #[error("Backend error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Input and state ──────────────────────────────────────────────
    #[error("{message}")]
    ValidationFailed { field: &'static str, message: String },

    #[error("Device not found: {id}")]
    DeviceNotFound { id: String },

    #[error("Cannot {action} from the {from} screen")]
    InvalidTransition { from: Screen, action: &'static str },

    // ── Local ────────────────────────────────────────────────────────
    #[error("Session storage error: {message}")]
    Storage { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            field,
            message: message.into(),
        }
    }

    /// Text for the UI. Transport details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthenticationFailed { .. } => MSG_BAD_CREDENTIALS.into(),
            Self::SessionExpired | Self::NotAuthenticated => MSG_SESSION_EXPIRED.into(),
            Self::Network { .. } => MSG_CONNECTION_FAILED.into(),
            Self::Api { message, .. } if !message.is_empty() => message.clone(),
            Self::Api { status, .. } => format!("Server error (HTTP {status})"),
            other => other.to_string(),
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ukurair_api::Error> for CoreError {
    fn from(err: ukurair_api::Error) -> Self {
        match err {
            ukurair_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            ukurair_api::Error::SessionExpired => CoreError::SessionExpired,
            ukurair_api::Error::Transport(e) => CoreError::Network {
                reason: e.to_string(),
            },
            ukurair_api::Error::StreamConnect(reason) => CoreError::Network { reason },
            ukurair_api::Error::StreamClosed { reason } => CoreError::Network { reason },
            ukurair_api::Error::Tls(msg) => CoreError::Network {
                reason: format!("TLS error: {msg}"),
            },
            ukurair_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ukurair_api::Error::Api { status, message } => CoreError::Api { status, message },
            ukurair_api::Error::PermissionDenied { path } => CoreError::Api {
                status: 401,
                message: format!("permission denied for {path}"),
            },
            ukurair_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
