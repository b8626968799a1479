// ── Runtime configuration ──
//
// These types describe which backend to talk to and how often to read it.
// They carry credential data and tuning, but never read config files.
// `ukurair-config` builds a `CoreConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use ukurair_api::{TlsMode, TransportConfig};

use crate::model::BackendKind;

/// Hosted REST API.
pub const DEFAULT_API_URL: &str = "https://ukurairpblrizki.vercel.app/api";
/// Hosted realtime database.
pub const DEFAULT_DATABASE_URL: &str = "https://ukurair-a852a-default-rtdb.firebaseio.com";
/// Readings kept per device history.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Which backend binding to use, and where it lives.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// REST API, polled.
    Rest { api_url: Url },
    /// Realtime database, pushed.
    Realtime {
        database_url: Url,
        api_key: SecretString,
        /// Override for the identity services (tests, emulators).
        identity_url: Option<Url>,
    },
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Rest { .. } => BackendKind::Rest,
            Self::Realtime { .. } => BackendKind::Realtime,
        }
    }
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed certs on a self-hosted API).
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Polling periods for the REST binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    /// Public dashboard.
    pub dashboard: Duration,
    /// Devices, settings, statistics and the admin panel's device charts.
    pub admin: Duration,
    /// The device detail history.
    pub history: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            dashboard: Duration::from_secs(3),
            admin: Duration::from_secs(5),
            history: Duration::from_secs(3),
        }
    }
}

/// Everything the controller needs to run.
///
/// Built by the front-end, passed to `Controller` -- core never reads
/// config files.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub backend: BackendConfig,
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    pub intervals: PollIntervals,
    /// Readings kept per device history.
    pub history_limit: usize,
    /// Where the signed-in session is persisted. `None` keeps it in memory.
    pub session_path: Option<PathBuf>,
}

impl CoreConfig {
    /// `backend` with default tuning and no session persistence.
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            backend,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            intervals: PollIntervals::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            session_path: None,
        }
    }

    pub fn rest(api_url: Url) -> Self {
        Self::new(BackendConfig::Rest { api_url })
    }

    pub fn realtime(database_url: Url, api_key: SecretString) -> Self {
        Self::new(BackendConfig::Realtime {
            database_url,
            api_key,
            identity_url: None,
        })
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: TlsMode::from(&self.tls),
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CoreConfig::rest(Url::parse(DEFAULT_API_URL).unwrap());
        assert_eq!(config.backend.kind(), BackendKind::Rest);
        assert_eq!(config.intervals.dashboard, Duration::from_secs(3));
        assert_eq!(config.intervals.admin, Duration::from_secs(5));
        assert_eq!(config.history_limit, 50);
        assert!(matches!(config.transport().tls, TlsMode::System));
    }

    #[test]
    fn realtime_kind() {
        let config = CoreConfig::realtime(
            Url::parse(DEFAULT_DATABASE_URL).unwrap(),
            SecretString::from("key".to_owned()),
        );
        assert_eq!(config.backend.kind(), BackendKind::Realtime);
    }
}
