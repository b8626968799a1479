use thiserror::Error;

/// Top-level error type for the `ukurair-api` crate.
///
/// Covers every failure mode across both backend bindings:
/// authentication, transport, the REST API, the realtime store and its
/// event stream. `ukurair-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong username/password, disabled account, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Token rejected on an authenticated call (HTTP 401/403 or revoked stream).
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Backend responses ───────────────────────────────────────────
    /// Non-success HTTP status that is not an auth failure.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The realtime store refused access to a path (`cancel` event).
    #[error("Permission denied for {path}")]
    PermissionDenied { path: String },

    // ── Streaming ───────────────────────────────────────────────────
    /// Event stream could not be opened.
    #[error("Event stream connection failed: {0}")]
    StreamConnect(String),

    /// Event stream ended or broke mid-flight.
    #[error("Event stream closed: {reason}")]
    StreamClosed { reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates auth has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            Self::StreamConnect(_) | Self::StreamClosed { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }
}

/// Truncate a response body for inclusion in error messages.
pub(crate) fn body_preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

/// Pull a human-readable message out of an error body.
///
/// Both backends answer errors as `{"message": "..."}` or
/// `{"error": "..."}`; anything else is returned as a truncated preview.
pub(crate) fn error_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        error: Option<serde_json::Value>,
    }

    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    parsed
        .and_then(|b| {
            b.message.or_else(|| match b.error {
                Some(serde_json::Value::String(s)) => Some(s),
                // Identity provider shape: {"error": {"message": "..."}}
                Some(serde_json::Value::Object(map)) => map
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_owned),
                _ => None,
            })
        })
        .unwrap_or_else(|| body_preview(body).to_owned())
}
