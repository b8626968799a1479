// REST API HTTP client
//
// Wraps `reqwest::Client` with base-URL path construction, bearer-token
// injection and status mapping. Endpoint groups (auth, devices, admin)
// are implemented as inherent methods in sibling files to keep this
// module focused on transport mechanics.

use std::sync::{PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, body_preview, error_message};
use crate::transport::TransportConfig;

/// Whether a request carries the bearer token, and therefore whether a
/// 401/403 means "session expired" rather than "bad request".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Auth {
    Public,
    Bearer,
}

/// HTTP client for the UKURAIR REST API.
///
/// All paths are relative to the API root (e.g. `https://host/api`).
/// The bearer token is held behind a lock so a shared client can be
/// re-authenticated in place after login or session restore.
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<SecretString>>,
}

impl RestClient {
    /// Create a new REST client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a REST client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            token: RwLock::new(None),
        }
    }

    /// The API root URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The underlying HTTP client.
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── Token management ─────────────────────────────────────────────

    /// Install a bearer token for authenticated calls.
    pub fn set_token(&self, token: SecretString) {
        debug!("storing bearer token");
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Forget the bearer token.
    pub fn clear_token(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Whether a bearer token is installed.
    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder, auth: Auth) -> Result<reqwest::RequestBuilder, Error> {
        if auth == Auth::Public {
            return Ok(builder);
        }
        let guard = self.token.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(token) => Ok(builder.bearer_auth(token.expose_secret())),
            // Nothing to send; the server would answer 401 anyway.
            None => Err(Error::SessionExpired),
        }
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Build `{base}/{seg}/{seg}...`, percent-encoding each segment.
    ///
    /// Device ids are backend-assigned and may contain characters that
    /// are not URL-safe, so they are never spliced in as raw text.
    pub(crate) fn api_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &[&str], auth: Auth) -> Result<T, Error> {
        let url = self.api_url(path)?;
        debug!("GET {}", url);
        let builder = self.apply_auth(self.http.get(url), auth)?;
        let resp = builder.send().await?;
        Self::parse_json(resp, auth).await
    }

    pub(crate) async fn post(&self, path: &[&str], body: &(impl Serialize + Sync)) -> Result<(), Error> {
        let url = self.api_url(path)?;
        debug!("POST {}", url);
        let builder = self.apply_auth(self.http.post(url).json(body), Auth::Bearer)?;
        let resp = builder.send().await?;
        Self::expect_success(resp, Auth::Bearer).await
    }

    pub(crate) async fn patch(&self, path: &[&str], body: &(impl Serialize + Sync)) -> Result<(), Error> {
        let url = self.api_url(path)?;
        debug!("PATCH {}", url);
        let builder = self.apply_auth(self.http.patch(url).json(body), Auth::Bearer)?;
        let resp = builder.send().await?;
        Self::expect_success(resp, Auth::Bearer).await
    }

    pub(crate) async fn put(&self, path: &[&str], body: &(impl Serialize + Sync)) -> Result<(), Error> {
        let url = self.api_url(path)?;
        debug!("PUT {}", url);
        let builder = self.apply_auth(self.http.put(url).json(body), Auth::Bearer)?;
        let resp = builder.send().await?;
        Self::expect_success(resp, Auth::Bearer).await
    }

    pub(crate) async fn delete(&self, path: &[&str]) -> Result<(), Error> {
        let url = self.api_url(path)?;
        debug!("DELETE {}", url);
        let builder = self.apply_auth(self.http.delete(url), Auth::Bearer)?;
        let resp = builder.send().await?;
        Self::expect_success(resp, Auth::Bearer).await
    }

    // ── Response handling ────────────────────────────────────────────

    /// Map auth and error statuses; returns the response on success.
    async fn check_status(resp: reqwest::Response, auth: Auth) -> Result<reqwest::Response, Error> {
        let status = resp.status();

        if auth == Auth::Bearer
            && (status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN)
        {
            return Err(Error::SessionExpired);
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

    async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response, auth: Auth) -> Result<T, Error> {
        let resp = Self::check_status(resp, auth).await?;
        let body = resp.text().await?;
        trace!(len = body.len(), "response body");

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", body_preview(&body)),
            body,
        })
    }

    async fn expect_success(resp: reqwest::Response, auth: Auth) -> Result<(), Error> {
        Self::check_status(resp, auth).await.map(|_| ())
    }
}
