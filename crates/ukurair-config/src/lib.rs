//! Shared configuration for the UKURAIR terminal dashboard.
//!
//! TOML profiles layered with environment overrides, credential
//! resolution (env + keyring + plaintext), and translation to
//! `ukurair_core::CoreConfig`. Paths follow platform conventions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use ukurair_core::{
    BackendConfig, BackendKind, CoreConfig, DEFAULT_API_URL, DEFAULT_DATABASE_URL,
    DEFAULT_HISTORY_LIMIT, PollIntervals, TlsVerification,
};

/// Keyring service all secrets are stored under.
const KEYRING_SERVICE: &str = "ukurair";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found in {path}")]
    UnknownProfile { name: String, path: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Resolve a profile by name, falling back to `default_profile`.
    ///
    /// A missing default profile yields the built-in REST profile; a
    /// missing profile that was asked for by name is an error.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, Profile), ConfigError> {
        let default_name = self.default_profile.as_deref().unwrap_or("default");
        let wanted = name.unwrap_or(default_name);

        match self.profiles.get(wanted) {
            Some(profile) => Ok((wanted.to_owned(), profile.clone())),
            None if name.is_none() || wanted == default_name => {
                Ok((wanted.to_owned(), Profile::default()))
            }
            None => Err(ConfigError::UnknownProfile {
                name: wanted.to_owned(),
                path: config_path().display().to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Request timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Dashboard poll period, seconds.
    #[serde(default = "default_dashboard_interval")]
    pub dashboard_interval: u64,

    /// Admin panel poll period, seconds.
    #[serde(default = "default_admin_interval")]
    pub admin_interval: u64,

    /// Device history poll period, seconds.
    #[serde(default = "default_history_interval")]
    pub history_interval: u64,

    /// Readings kept per device history.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default)]
    pub insecure: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            dashboard_interval: default_dashboard_interval(),
            admin_interval: default_admin_interval(),
            history_interval: default_history_interval(),
            history_limit: default_history_limit(),
            insecure: false,
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_dashboard_interval() -> u64 {
    3
}
fn default_admin_interval() -> u64 {
    5
}
fn default_history_interval() -> u64 {
    3
}
fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

/// A named backend profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Backend binding: "rest" or "realtime".
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// REST API base URL.
    pub api_url: Option<String>,

    /// Realtime database URL.
    pub database_url: Option<String>,

    /// Identity service base URL override (emulators).
    pub identity_url: Option<String>,

    /// Realtime API key (plaintext, prefer keyring or env var).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    /// Login name pre-filled in the login form.
    pub username: Option<String>,

    /// Password (plaintext, prefer keyring).
    pub password: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

fn default_backend() -> BackendKind {
    BackendKind::Rest
}

/// The hosted REST API.
impl Default for Profile {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            api_url: Some(DEFAULT_API_URL.into()),
            database_url: None,
            identity_url: None,
            api_key: None,
            api_key_env: None,
            username: None,
            password: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
        }
    }
}

/// Command-line values that win over the profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileOverrides {
    pub backend: Option<BackendKind>,
    pub api_url: Option<String>,
    pub database_url: Option<String>,
}

impl Profile {
    pub fn apply(&mut self, overrides: &ProfileOverrides) {
        if let Some(backend) = overrides.backend {
            self.backend = backend;
        }
        if let Some(ref url) = overrides.api_url {
            self.api_url = Some(url.clone());
        }
        if let Some(ref url) = overrides.database_url {
            self.database_url = Some(url.clone());
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("id", "ukurair", "ukurair")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Where the signed-in session is persisted.
pub fn session_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".local/share").join("session.json"),
        |dirs| dirs.data_dir().join("session.json"),
    )
}

/// Default log file location.
pub fn log_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".cache").join("ukurair.log"),
        |dirs| dirs.cache_dir().join("ukurair.log"),
    )
}

fn dirs_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("ukurair");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file, still honouring `UKURAIR_*` variables.
///
/// `UKURAIR_DEFAULTS__TIMEOUT=10` overrides `defaults.timeout`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("UKURAIR_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_secret(profile_name: &str, kind: &str) -> Option<SecretString> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{kind}")).ok()?;
    entry.get_password().ok().map(SecretString::from)
}

/// Resolve the realtime API key from the credential chain.
pub fn resolve_api_key(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's api_key_env → env var lookup
    if let Some(ref env_name) = profile.api_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Some(secret) = keyring_secret(profile_name, "api-key") {
        return Ok(secret);
    }

    // 3. Plaintext in config
    if let Some(ref key) = profile.api_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve stored login credentials for pre-filling the login form.
pub fn resolve_login(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var("UKURAIR_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    // 1. Env var
    if let Ok(pw) = std::env::var("UKURAIR_PASSWORD") {
        return Ok((username, SecretString::from(pw)));
    }

    // 2. Keyring
    if let Some(pw) = keyring_secret(profile_name, "password") {
        return Ok((username, pw));
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok((username, SecretString::from(pw.clone())));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Translation ─────────────────────────────────────────────────────

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

fn positive_secs(field: &str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be at least 1 second".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}

/// Build a `CoreConfig` from a profile and the global defaults.
pub fn profile_to_core_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<CoreConfig, ConfigError> {
    let backend = match profile.backend {
        BackendKind::Rest => BackendConfig::Rest {
            api_url: parse_url(
                "api_url",
                profile.api_url.as_deref().unwrap_or(DEFAULT_API_URL),
            )?,
        },
        BackendKind::Realtime => BackendConfig::Realtime {
            database_url: parse_url(
                "database_url",
                profile.database_url.as_deref().unwrap_or(DEFAULT_DATABASE_URL),
            )?,
            api_key: resolve_api_key(profile, profile_name)?,
            identity_url: profile
                .identity_url
                .as_deref()
                .map(|raw| parse_url("identity_url", raw))
                .transpose()?,
        },
    };

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    if defaults.history_limit == 0 {
        return Err(ConfigError::Validation {
            field: "history_limit".into(),
            reason: "must be at least 1".into(),
        });
    }

    Ok(CoreConfig {
        backend,
        tls,
        timeout: positive_secs("timeout", profile.timeout.unwrap_or(defaults.timeout))?,
        intervals: PollIntervals {
            dashboard: positive_secs("dashboard_interval", defaults.dashboard_interval)?,
            admin: positive_secs("admin_interval", defaults.admin_interval)?,
            history: positive_secs("history_interval", defaults.history_interval)?,
        },
        history_limit: defaults.history_limit,
        session_path: Some(session_path()),
    })
}
