//! App-key login used by the token voice channel.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use super::{
    Authenticator, CredentialError, IssuedToken, decode_token_response, expires_in_secs,
};
use crate::secret::Secret;
use crate::transport::{Transport, join_path};

/// Login path, relative to the API base URL.
pub const FAST_LOGIN_PATH: &str = "/rest/fastlogin/v1.0";

/// Refresh path, relative to the API base URL.
pub const REFRESH_PATH: &str = "/omp/oauth/refresh";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    resultcode: Option<String>,
    #[serde(default)]
    resultdesc: Option<String>,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

/// Logs in with app key, username and a per-call device id, and refreshes
/// with app key and app secret.
#[derive(Debug, Clone)]
pub struct FastLoginAuthenticator {
    base_url: Url,
    app_key: String,
    app_secret: Secret,
    username: String,
    authorization: Secret,
}

impl FastLoginAuthenticator {
    /// Create an authenticator.
    pub fn new(
        base_url: Url,
        app_key: impl Into<String>,
        app_secret: Secret,
        username: impl Into<String>,
        authorization: Secret,
    ) -> Self {
        Self {
            base_url,
            app_key: app_key.into(),
            app_secret,
            username: username.into(),
            authorization,
        }
    }

    /// Login URL with a fresh device id.
    pub fn login_url(&self) -> Url {
        let mut url = join_path(&self.base_url, FAST_LOGIN_PATH);
        url.query_pairs_mut()
            .append_pair("app_key", &self.app_key)
            .append_pair("username", &self.username)
            .append_pair("device_id", &Uuid::new_v4().to_string());
        url
    }

    /// Refresh URL for `refresh_token`.
    pub fn refresh_url(&self, refresh_token: &str) -> Url {
        let mut url = join_path(&self.base_url, REFRESH_PATH);
        url.query_pairs_mut()
            .append_pair("app_key", &self.app_key)
            .append_pair("app_secret", self.app_secret.expose())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", refresh_token);
        url
    }

    fn into_issued(endpoint: &str, response: TokenResponse) -> Result<IssuedToken, CredentialError> {
        if let Some(code) = response.resultcode.as_deref()
            && code != "0"
        {
            return Err(CredentialError::Refused {
                endpoint: endpoint.to_string(),
                code: code.to_string(),
                message: response.resultdesc.unwrap_or_default(),
            });
        }

        if response.access_token.is_empty() {
            return Err(CredentialError::Malformed {
                endpoint: endpoint.to_string(),
                message: "response carries no access_token".to_string(),
            });
        }

        Ok(IssuedToken {
            expires_in: expires_in_secs(response.expires_in.as_ref()),
            access_token: response.access_token,
            refresh_token: response.refresh_token,
        })
    }
}

#[async_trait]
impl Authenticator for FastLoginAuthenticator {
    fn name(&self) -> &'static str {
        "fast_login"
    }

    async fn acquire(
        &self,
        transport: &Transport,
        cancel: &CancellationToken,
    ) -> Result<IssuedToken, CredentialError> {
        let request = transport
            .post(self.login_url())
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(reqwest::header::AUTHORIZATION, self.authorization.expose());

        let response = transport.execute(request, cancel).await?;
        let endpoint = response.endpoint.clone();
        let body: TokenResponse = decode_token_response(response, |endpoint, status, body| {
            CredentialError::Rejected {
                endpoint,
                status,
                body,
            }
        })?;

        Self::into_issued(&endpoint, body)
    }

    async fn refresh(
        &self,
        transport: &Transport,
        cancel: &CancellationToken,
        refresh_token: &str,
    ) -> Result<IssuedToken, CredentialError> {
        let request = transport
            .post(self.refresh_url(refresh_token))
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE);

        let response = transport.execute(request, cancel).await?;
        let endpoint = response.endpoint.clone();
        let body: TokenResponse = decode_token_response(response, |endpoint, status, body| {
            CredentialError::RefreshDenied {
                endpoint,
                status,
                body,
            }
        })?;

        Self::into_issued(&endpoint, body)
    }
}
