// REST API authentication
//
// Username/password login against `POST /auth/login`. The returned JWT
// is installed as the client's bearer token; the API has no logout
// endpoint, so logout only forgets the token locally.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::{Error, error_message};
use crate::rest::client::RestClient;
use crate::rest::models::{LoginRequest, LoginResponse, UserRecord};

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct RestLogin {
    pub token: SecretString,
    pub user: UserRecord,
}

impl RestClient {
    /// Authenticate with username/password.
    ///
    /// On success the token is stored on the client and used for all
    /// subsequent authenticated calls. HTTP 401 and a success body that
    /// carries no token are both reported as `Error::Authentication`.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<RestLogin, Error> {
        let url = self.api_url(&["auth", "login"])?;
        debug!("logging in at {}", url);

        let body = LoginRequest {
            username,
            password: password.expose_secret(),
        };

        let resp = self.http().post(url).json(&body).send().await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: error_message(&body),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let login: LoginResponse = resp.json().await?;
        let Some(token) = login.token.filter(|t| !t.is_empty()) else {
            return Err(Error::Authentication {
                message: "login response carried no token".into(),
            });
        };

        let token = SecretString::from(token);
        self.set_token(token.clone());

        debug!("login successful");
        Ok(RestLogin {
            token,
            user: login.user.unwrap_or_default(),
        })
    }

    /// Forget the session token.
    pub fn logout(&self) {
        debug!("dropping REST session");
        self.clear_token();
    }

    /// Reinstall a token restored from a persisted session.
    pub fn resume(&self, token: SecretString) {
        self.set_token(token);
    }
}
