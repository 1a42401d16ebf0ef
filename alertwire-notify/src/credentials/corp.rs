//! Corp id / corp secret tokens used by the app message channel.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{
    Authenticator, CredentialError, IssuedToken, decode_token_response, expires_in_secs,
};
use crate::secret::Secret;
use crate::transport::{Transport, join_path};

/// Renewal threshold for corp tokens, which live two hours.
pub const CORP_REFRESH_AFTER: Duration = Duration::from_secs(110 * 60);

#[derive(Debug, Deserialize)]
struct CorpTokenResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

/// Fetches corp access tokens. There is no refresh token: renewal logs in
/// again.
#[derive(Debug, Clone)]
pub struct CorpTokenAuthenticator {
    base_url: Url,
    corp_id: String,
    corp_secret: Secret,
}

impl CorpTokenAuthenticator {
    /// Create an authenticator.
    pub fn new(base_url: Url, corp_id: impl Into<String>, corp_secret: Secret) -> Self {
        Self {
            base_url,
            corp_id: corp_id.into(),
            corp_secret,
        }
    }

    /// Token URL.
    pub fn token_url(&self) -> Url {
        let mut url = join_path(&self.base_url, "/gettoken");
        url.query_pairs_mut()
            .append_pair("corpid", &self.corp_id)
            .append_pair("corpsecret", self.corp_secret.expose());
        url
    }
}

#[async_trait]
impl Authenticator for CorpTokenAuthenticator {
    fn name(&self) -> &'static str {
        "corp_token"
    }

    async fn acquire(
        &self,
        transport: &Transport,
        cancel: &CancellationToken,
    ) -> Result<IssuedToken, CredentialError> {
        let request = transport
            .get(self.token_url())
            .header(reqwest::header::ACCEPT, "application/json");

        let response = transport.execute(request, cancel).await?;
        let endpoint = response.endpoint.clone();
        let body: CorpTokenResponse = decode_token_response(response, |endpoint, status, body| {
            CredentialError::Rejected {
                endpoint,
                status,
                body,
            }
        })?;

        if body.errcode != 0 {
            return Err(CredentialError::Refused {
                endpoint,
                code: body.errcode.to_string(),
                message: body.errmsg,
            });
        }
        if body.access_token.is_empty() {
            return Err(CredentialError::Malformed {
                endpoint,
                message: "response carries no access_token".to_string(),
            });
        }

        Ok(IssuedToken {
            expires_in: expires_in_secs(body.expires_in.as_ref()),
            access_token: body.access_token,
            refresh_token: String::new(),
        })
    }

    fn refresh_after(&self) -> Duration {
        CORP_REFRESH_AFTER
    }
}
