// Realtime database HTTP client
//
// Speaks the database's REST surface: every node is addressable as
// `{database}/{path}.json`, authenticated with `?auth={id_token}`.
// Identity calls live in `auth.rs`, domain writes in `devices.rs`,
// server-sent event subscriptions in `stream.rs`.

use std::sync::{PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::error::{Error, error_message};
use crate::realtime::stream::ReconnectConfig;
use crate::transport::TransportConfig;

const IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com";

/// Connection settings for a realtime database project.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Database root, e.g. `https://<project>-default-rtdb.firebaseio.com`.
    pub database_url: Url,
    /// Web API key of the project (identity calls only).
    pub api_key: SecretString,
    /// Identity provider base. Overridable for tests.
    pub identity_url: Url,
    /// Token refresh service base. Overridable for tests.
    pub token_url: Url,
    pub reconnect: ReconnectConfig,
}

impl RealtimeConfig {
    /// Settings for `database_url` against the hosted identity services.
    pub fn new(database_url: Url, api_key: SecretString) -> Result<Self, Error> {
        Ok(Self {
            database_url,
            api_key,
            identity_url: Url::parse(IDENTITY_URL)?,
            token_url: Url::parse(SECURE_TOKEN_URL)?,
            reconnect: ReconnectConfig::default(),
        })
    }

    /// Point both identity services at `base` (mock servers).
    pub fn with_identity_base(mut self, base: Url) -> Self {
        self.identity_url = base.clone();
        self.token_url = base;
        self
    }
}

/// Client for the realtime database and its identity provider.
pub struct RealtimeClient {
    http: reqwest::Client,
    stream_http: reqwest::Client,
    config: RealtimeConfig,
    id_token: RwLock<Option<SecretString>>,
}

impl RealtimeClient {
    pub fn new(config: RealtimeConfig, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            stream_http: transport.build_streaming_client()?,
            config,
            id_token: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn stream_http(&self) -> &reqwest::Client {
        &self.stream_http
    }

    // ── Token management ─────────────────────────────────────────────

    /// Install the ID token used for database calls.
    pub fn set_id_token(&self, token: SecretString) {
        *self.id_token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    pub fn clear_id_token(&self) {
        *self.id_token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn has_id_token(&self) -> bool {
        self.id_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub(crate) fn id_token(&self) -> Option<SecretString> {
        self.id_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// `{database}/{path}.json?auth=..&{query}`
    ///
    /// An empty path addresses the root (`/.json`), which is where
    /// multi-path updates are sent.
    pub(crate) fn node_url(
        &self,
        path: &str,
        query: &[(String, String)],
        token: Option<&SecretString>,
    ) -> Result<Url, Error> {
        let mut url = self.config.database_url.clone();
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            segments.pop_if_empty();
            match parts.split_last() {
                Some((last, parents)) => {
                    segments.extend(parents);
                    segments.push(&format!("{last}.json"));
                }
                None => {
                    segments.push(".json");
                }
            }
        }

        if token.is_some() || !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            if let Some(token) = token {
                pairs.append_pair("auth", token.expose_secret());
            }
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }

        Ok(url)
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Atomic multi-path update at the root. A `null` value deletes.
    pub async fn update(&self, changes: Map<String, Value>) -> Result<(), Error> {
        let token = self.id_token();
        let url = self.node_url("", &[], token.as_ref())?;
        debug!(paths = changes.len(), "PATCH multi-path update");
        let resp = self
            .http
            .patch(url)
            .json(&Value::Object(changes))
            .send()
            .await?;
        check_status(resp, "/", token.is_some()).await.map(|_| ())
    }

    /// Overwrite the value at `path`.
    pub async fn put(&self, path: &str, value: &Value) -> Result<(), Error> {
        let token = self.id_token();
        let url = self.node_url(path, &[], token.as_ref())?;
        debug!(path, "PUT node");
        let resp = self.http.put(url).json(value).send().await?;
        check_status(resp, path, token.is_some()).await.map(|_| ())
    }
}

/// Map database status codes.
///
/// The database answers 401 both for an expired token and for a rules
/// denial; with a token attached the former is assumed.
pub(crate) async fn check_status(
    resp: reqwest::Response,
    path: &str,
    authenticated: bool,
) -> Result<reqwest::Response, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        if authenticated {
            return Err(Error::SessionExpired);
        }
        return Err(Error::PermissionDenied {
            path: path.to_owned(),
        });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    Ok(resp)
}
