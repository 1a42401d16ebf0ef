//! Dispatch error types and the retry contract.

use thiserror::Error;

use crate::credentials::CredentialError;
use crate::template::TemplateError;
use crate::transport::TransportError;

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Outcome of one `notify` call. `Ok(())` means delivered.
pub type DispatchResult = Result<()>;

/// Errors surfaced by a notification channel.
///
/// Whether the caller may retry is decided by [`DispatchError::is_retryable`];
/// no other part of the crate carries a separate retry flag.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Title or body template failed to render.
    #[error("failed to template 'title' or 'body': {0}")]
    Template(#[from] TemplateError),

    /// The first login exchange for an access token failed.
    #[error("token acquisition failed: {0}")]
    TokenAcquisition(#[source] CredentialError),

    /// Renewing a stale access token failed.
    #[error("token refresh failed: {0}")]
    TokenRefresh(#[source] CredentialError),

    /// No response was received (connect, DNS, timeout, reset).
    #[error("transport error calling {endpoint}: {message}")]
    Transport {
        /// Redacted endpoint.
        endpoint: String,
        /// Underlying error message.
        message: String,
    },

    /// The caller cancelled the request while it was in flight.
    #[error("request to {endpoint} was cancelled")]
    Cancelled {
        /// Redacted endpoint.
        endpoint: String,
    },

    /// The endpoint answered with a non-2xx status.
    #[error("unexpected status {code} from {endpoint}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Redacted endpoint.
        endpoint: String,
    },

    /// The endpoint answered 2xx with a body that could not be decoded.
    #[error("malformed response from {endpoint}: {message}")]
    MalformedResponse {
        /// Redacted endpoint.
        endpoint: String,
        /// Decoder message.
        message: String,
    },

    /// The endpoint accepted the HTTP call but refused the message.
    #[error("{endpoint} rejected the request: {message}")]
    Rejected {
        /// Redacted endpoint.
        endpoint: String,
        /// Remote result code and description.
        message: String,
    },

    /// Invalid static configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Payload could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DispatchError {
    /// Check whether retrying the same call later is expected to help.
    ///
    /// Malformed responses are permanent: the remote is assumed to keep
    /// answering the same payload.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TokenAcquisition(_)
            | Self::TokenRefresh(_)
            | Self::Transport { .. }
            | Self::Cancelled { .. } => true,
            Self::Status { code, .. } => (500..=599).contains(code),
            Self::Template(_)
            | Self::MalformedResponse { .. }
            | Self::Rejected { .. }
            | Self::Config(_)
            | Self::Serialization(_) => false,
        }
    }

    /// Get the HTTP status code if the endpoint answered with one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if this error came from a cancelled request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<TransportError> for DispatchError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Failed { endpoint, message } => Self::Transport { endpoint, message },
            TransportError::Cancelled { endpoint } => Self::Cancelled { endpoint },
            TransportError::Build(message) => Self::Config(message),
        }
    }
}

/// Split a [`DispatchResult`] into the `(retryable, error)` pair upstream
/// schedulers expect.
pub trait DispatchOutcome {
    /// `(false, None)` when delivered, `(retryable, Some(err))` otherwise.
    fn into_parts(self) -> (bool, Option<DispatchError>);

    /// Retry bit alone.
    fn is_retryable(&self) -> bool;
}

impl DispatchOutcome for DispatchResult {
    fn into_parts(self) -> (bool, Option<DispatchError>) {
        match self {
            Ok(()) => (false, None),
            Err(err) => (err.is_retryable(), Some(err)),
        }
    }

    fn is_retryable(&self) -> bool {
        self.as_ref().err().is_some_and(DispatchError::is_retryable)
    }
}
