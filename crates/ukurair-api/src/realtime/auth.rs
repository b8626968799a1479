// Realtime identity provider
//
// Email/password sign-in and refresh-token exchange. Both return a
// short-lived ID token that is installed on the client for database calls.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::error::{Error, error_message};
use crate::realtime::client::RealtimeClient;
use crate::realtime::models::{
    IdentitySession, RefreshRequest, RefreshResponse, SignInRequest, SignInResponse,
};

/// Provider error codes that mean "these credentials are wrong".
const CREDENTIAL_ERRORS: &[&str] = &[
    "EMAIL_NOT_FOUND",
    "INVALID_PASSWORD",
    "INVALID_LOGIN_CREDENTIALS",
    "INVALID_EMAIL",
    "MISSING_PASSWORD",
    "USER_DISABLED",
];

/// Provider error codes that mean "the refresh token is no longer valid".
const REFRESH_ERRORS: &[&str] = &[
    "TOKEN_EXPIRED",
    "INVALID_REFRESH_TOKEN",
    "USER_NOT_FOUND",
    "USER_DISABLED",
];

impl RealtimeClient {
    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<IdentitySession, Error> {
        let url = self.identity_endpoint(&self.config().identity_url, &["v1", "accounts:signInWithPassword"])?;
        debug!("signing in at {}", url.path());

        let body = SignInRequest {
            email,
            password: password.expose_secret(),
            return_secure_token: true,
        };

        let resp = self.http().post(url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let code = error_message(&body);
            if CREDENTIAL_ERRORS.iter().any(|c| *c == provider_code(&code)) {
                return Err(Error::Authentication { message: code });
            }
            return Err(Error::Api {
                status: status.as_u16(),
                message: code,
            });
        }

        let session: IdentitySession = resp.json::<SignInResponse>().await?.into();
        self.set_id_token(session.id_token.clone());

        debug!("sign-in successful");
        Ok(session)
    }

    /// Exchange a refresh token for a fresh ID token.
    pub async fn refresh(&self, refresh_token: &SecretString) -> Result<IdentitySession, Error> {
        let url = self.identity_endpoint(&self.config().token_url, &["v1", "token"])?;
        debug!("refreshing ID token");

        let form = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token: refresh_token.expose_secret(),
        };

        let resp = self.http().post(url).form(&form).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let code = error_message(&body);
            if REFRESH_ERRORS.iter().any(|c| *c == provider_code(&code)) {
                return Err(Error::SessionExpired);
            }
            return Err(Error::Api {
                status: status.as_u16(),
                message: code,
            });
        }

        let refreshed: RefreshResponse = resp.json().await?;
        let session = IdentitySession {
            id_token: SecretString::from(refreshed.id_token),
            refresh_token: SecretString::from(refreshed.refresh_token),
            expires_in: std::time::Duration::from_secs(refreshed.expires_in),
            email: None,
            local_id: refreshed.user_id,
            display_name: None,
        };
        self.set_id_token(session.id_token.clone());
        Ok(session)
    }

    /// Drop the ID token. The provider keeps no server-side session.
    pub fn sign_out(&self) {
        debug!("dropping realtime session");
        self.clear_id_token();
    }

    fn identity_endpoint(&self, base: &Url, segments: &[&str]) -> Result<Url, Error> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("key", self.config().api_key.expose_secret());
        Ok(url)
    }
}

/// `"TOO_MANY_ATTEMPTS_TRY_LATER : Access disabled"` -> `"TOO_MANY_ATTEMPTS_TRY_LATER"`
fn provider_code(message: &str) -> &str {
    message.split(" : ").next().unwrap_or(message).trim()
}
