//! Access token lifecycle for token-authenticated channels.
//!
//! A [`CredentialManager`] owns one channel's [`TokenState`] and decides
//! before every send whether the token must be acquired, refreshed or can be
//! used as is. Renewal runs under a single async gate: concurrent callers
//! that find the token stale queue on the gate, and every caller after the
//! first sees the renewed state and skips its own round trip.
//!
//! The renewal threshold is a fixed policy per [`Authenticator`]. Expiry
//! values reported by the server are logged and otherwise ignored.

mod corp;
mod fast_login;

pub use corp::{CORP_REFRESH_AFTER, CorpTokenAuthenticator};
pub use fast_login::{FAST_LOGIN_PATH, FastLoginAuthenticator, REFRESH_PATH};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::transport::{HttpResponse, Transport, TransportError};

/// Renewal threshold for tokens with a ~48 hour lifetime.
pub const DEFAULT_REFRESH_AFTER: Duration = Duration::from_secs(47 * 60 * 60);

/// Token endpoint failures.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The login exchange answered with a non-2xx status.
    #[error("login at {endpoint} answered status {status}: {body}")]
    Rejected {
        /// Redacted endpoint.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The refresh exchange answered with a non-2xx status.
    #[error("token refresh at {endpoint} answered status {status}: {body}")]
    RefreshDenied {
        /// Redacted endpoint.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The endpoint answered 2xx but reported an error code.
    #[error("{endpoint} refused the token request: {code} {message}")]
    Refused {
        /// Redacted endpoint.
        endpoint: String,
        /// Remote result code.
        code: String,
        /// Remote description.
        message: String,
    },

    /// The token response could not be decoded.
    #[error("malformed token response from {endpoint}: {message}")]
    Malformed {
        /// Redacted endpoint.
        endpoint: String,
        /// Decoder message.
        message: String,
    },

    /// No response was received.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A refresh was requested but no refresh token is stored.
    #[error("no refresh token available")]
    MissingRefreshToken,
}

impl CredentialError {
    /// Check if repeating the exchange with the same configuration is
    /// expected to fail again.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Rejected { .. }
                | Self::Refused { .. }
                | Self::Malformed { .. }
                | Self::Transport(TransportError::Build(_))
        )
    }
}

/// Token pair returned by an exchange.
#[derive(Clone, Default)]
pub struct IssuedToken {
    /// New access token.
    pub access_token: String,
    /// New refresh token, empty if the scheme has none.
    pub refresh_token: String,
    /// Lifetime reported by the server, in seconds.
    pub expires_in: Option<u64>,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Stored token state of one channel.
#[derive(Clone, Default)]
pub struct TokenState {
    /// Current access token, empty before the first login.
    pub access_token: String,
    /// Current refresh token.
    pub refresh_token: String,
    /// When the current pair was issued.
    pub issued_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenState")
            .field("has_access_token", &!self.access_token.is_empty())
            .field("has_refresh_token", &!self.refresh_token.is_empty())
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// What has to happen before the stored token can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renewal {
    /// Nothing stored, or stale without a refresh token: log in.
    Acquire,
    /// Stale: exchange the refresh token.
    Refresh,
    /// Usable as is.
    Fresh,
}

impl TokenState {
    /// Create a state from an existing token pair issued at `issued_at`.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            issued_at: Some(issued_at),
        }
    }

    /// Decide the renewal step at `now`.
    ///
    /// The token is stale once `refresh_after` has fully elapsed since it
    /// was issued. A token with no issue time is stale.
    pub fn renewal(&self, now: DateTime<Utc>, refresh_after: Duration) -> Renewal {
        if self.access_token.is_empty() {
            return Renewal::Acquire;
        }

        let stale = match self.issued_at {
            None => true,
            Some(issued_at) => now
                .signed_duration_since(issued_at)
                .to_std()
                .is_ok_and(|elapsed| elapsed >= refresh_after),
        };

        match (stale, self.refresh_token.is_empty()) {
            (false, _) => Renewal::Fresh,
            (true, true) => Renewal::Acquire,
            (true, false) => Renewal::Refresh,
        }
    }

    fn replace(&mut self, issued: IssuedToken, now: DateTime<Utc>) {
        self.access_token = issued.access_token;
        self.refresh_token = issued.refresh_token;
        self.issued_at = Some(now);
    }
}

/// A token endpoint scheme.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Short name for logs and errors.
    fn name(&self) -> &'static str;

    /// Full login exchange.
    async fn acquire(
        &self,
        transport: &Transport,
        cancel: &CancellationToken,
    ) -> Result<IssuedToken, CredentialError>;

    /// Exchange a refresh token for a new pair. Schemes without refresh
    /// tokens log in again.
    async fn refresh(
        &self,
        transport: &Transport,
        cancel: &CancellationToken,
        refresh_token: &str,
    ) -> Result<IssuedToken, CredentialError> {
        let _ = refresh_token;
        self.acquire(transport, cancel).await
    }

    /// Age after which a token is renewed before use.
    fn refresh_after(&self) -> Duration {
        DEFAULT_REFRESH_AFTER
    }
}

/// Owns and renews one channel's access token.
#[derive(Debug)]
pub struct CredentialManager<A> {
    authenticator: A,
    transport: Transport,
    state: RwLock<TokenState>,
    renewal_gate: Mutex<()>,
}

impl<A: Authenticator> CredentialManager<A> {
    /// Create a manager with no token.
    pub fn new(authenticator: A, transport: Transport) -> Self {
        Self::with_state(authenticator, transport, TokenState::default())
    }

    /// Create a manager seeded with an existing token state.
    pub fn with_state(authenticator: A, transport: Transport, state: TokenState) -> Self {
        Self {
            authenticator,
            transport,
            state: RwLock::new(state),
            renewal_gate: Mutex::new(()),
        }
    }

    /// The authenticator.
    pub fn authenticator(&self) -> &A {
        &self.authenticator
    }

    /// Snapshot of the stored state.
    pub fn state(&self) -> TokenState {
        self.state.read().clone()
    }

    /// Return a usable access token, acquiring or refreshing it first if
    /// needed.
    pub async fn access_token(&self, cancel: &CancellationToken) -> Result<String, DispatchError> {
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }

        let _gate = self.lock_gate(cancel).await?;

        let (renewal, refresh_token) = {
            let state = self.state.read();
            (
                state.renewal(Utc::now(), self.authenticator.refresh_after()),
                state.refresh_token.clone(),
            )
        };

        match renewal {
            Renewal::Fresh => {
                debug!(authenticator = self.authenticator.name(), "Token renewed by another caller");
                Ok(self.state.read().access_token.clone())
            }
            Renewal::Acquire => self.acquire_locked(cancel).await,
            Renewal::Refresh => self.refresh_locked(cancel, &refresh_token).await,
        }
    }

    /// Force a full login, replacing the stored state on success.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<String, DispatchError> {
        let _gate = self.lock_gate(cancel).await?;
        self.acquire_locked(cancel).await
    }

    /// Force a refresh with the stored refresh token.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<String, DispatchError> {
        let _gate = self.lock_gate(cancel).await?;
        let refresh_token = self.state.read().refresh_token.clone();
        if refresh_token.is_empty() {
            return Err(DispatchError::TokenRefresh(
                CredentialError::MissingRefreshToken,
            ));
        }
        self.refresh_locked(cancel, &refresh_token).await
    }

    fn fresh_token(&self) -> Option<String> {
        let state = self.state.read();
        (state.renewal(Utc::now(), self.authenticator.refresh_after()) == Renewal::Fresh)
            .then(|| state.access_token.clone())
    }

    async fn lock_gate(
        &self,
        cancel: &CancellationToken,
    ) -> Result<tokio::sync::MutexGuard<'_, ()>, DispatchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DispatchError::Cancelled {
                endpoint: self.authenticator.name().to_string(),
            }),
            guard = self.renewal_gate.lock() => Ok(guard),
        }
    }

    async fn acquire_locked(&self, cancel: &CancellationToken) -> Result<String, DispatchError> {
        info!(authenticator = self.authenticator.name(), "Acquiring access token");

        let issued = self
            .authenticator
            .acquire(&self.transport, cancel)
            .await
            .map_err(|e| {
                warn!(
                    authenticator = self.authenticator.name(),
                    permanent = e.is_permanent(),
                    error = %e,
                    "Token acquisition failed"
                );
                DispatchError::TokenAcquisition(e)
            })?;

        Ok(self.store(issued))
    }

    async fn refresh_locked(
        &self,
        cancel: &CancellationToken,
        refresh_token: &str,
    ) -> Result<String, DispatchError> {
        info!(authenticator = self.authenticator.name(), "Refreshing access token");

        let issued = self
            .authenticator
            .refresh(&self.transport, cancel, refresh_token)
            .await
            .map_err(|e| {
                warn!(
                    authenticator = self.authenticator.name(),
                    permanent = e.is_permanent(),
                    error = %e,
                    "Token refresh failed"
                );
                DispatchError::TokenRefresh(e)
            })?;

        Ok(self.store(issued))
    }

    fn store(&self, issued: IssuedToken) -> String {
        debug!(
            authenticator = self.authenticator.name(),
            reported_expires_in = ?issued.expires_in,
            "Stored new access token"
        );
        let token = issued.access_token.clone();
        self.state.write().replace(issued, Utc::now());
        token
    }
}

/// Check status and decode a token response body.
///
/// `on_status` builds the error for a non-2xx answer so acquisition and
/// refresh can classify it differently.
pub(crate) fn decode_token_response<T, F>(
    response: HttpResponse,
    on_status: F,
) -> Result<T, CredentialError>
where
    T: serde::de::DeserializeOwned,
    F: FnOnce(String, u16, String) -> CredentialError,
{
    if !response.is_success() {
        let body = response.text();
        return Err(on_status(response.endpoint, response.status.as_u16(), body));
    }

    response.json().map_err(|e| CredentialError::Malformed {
        endpoint: response.endpoint.clone(),
        message: e.to_string(),
    })
}

/// Read `expires_in` whether the server sends a number or a numeric string.
pub(crate) fn expires_in_secs(value: Option<&serde_json::Value>) -> Option<u64> {
    value.and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    })
}
