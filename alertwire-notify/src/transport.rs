//! Shared HTTP transport.
//!
//! One [`Transport`] is built per process and cloned into every channel so
//! connections are pooled across calls. Every request goes through
//! [`Transport::execute`], which races the call against the caller's
//! cancellation token and always reads the response body to the end.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Low-level transport failures, before classification.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response was received.
    #[error("request to {endpoint} failed: {message}")]
    Failed {
        /// Redacted endpoint.
        endpoint: String,
        /// Underlying error message, without the URL.
        message: String,
    },

    /// The cancellation token fired before the exchange completed.
    #[error("request to {endpoint} was cancelled")]
    Cancelled {
        /// Redacted endpoint.
        endpoint: String,
    },

    /// The request or client could not be built.
    #[error("invalid request: {0}")]
    Build(String),
}

/// HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// How long idle pooled connections are kept.
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// User agent string.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
            user_agent: format!("alertwire/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransportConfig {
    /// Create a new configuration builder.
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::default()
    }
}

/// Builder for [`TransportConfig`].
#[derive(Debug, Default)]
pub struct TransportConfigBuilder {
    config: TransportConfig,
}

impl TransportConfigBuilder {
    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the pool idle timeout.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Set the maximum idle connections per host.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Set the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the configuration.
    pub fn build(self) -> TransportConfig {
        self.config
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Response status.
    pub status: StatusCode,
    /// Complete response body.
    pub body: Bytes,
    /// Redacted request endpoint.
    pub endpoint: String,
}

impl HttpResponse {
    /// Check for a 2xx status.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Body as lossy UTF-8, for logging.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Pooled HTTP client shared by all channels.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    config: TransportConfig,
}

impl Transport {
    /// Build a transport from configuration.
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client, config: TransportConfig) -> Self {
        Self { client, config }
    }

    /// Transport with default configuration.
    pub fn default_transport() -> Result<Self, TransportError> {
        Self::new(TransportConfig::default())
    }

    /// Underlying reqwest client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Transport configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Start a GET request.
    pub fn get(&self, url: Url) -> RequestBuilder {
        self.client.get(url)
    }

    /// Start a POST request.
    pub fn post(&self, url: Url) -> RequestBuilder {
        self.client.post(url)
    }

    /// Send a request and read the whole response.
    ///
    /// Returns as soon as `cancel` fires, dropping the in-flight exchange.
    /// Any status is returned as a response; only missing responses are
    /// errors.
    pub async fn execute(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, TransportError> {
        let request = request
            .build()
            .map_err(|e| TransportError::Build(e.without_url().to_string()))?;
        let endpoint = redact(request.url());

        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled { endpoint });
        }

        debug!(endpoint = %endpoint, method = %request.method(), "Sending request");

        let exchange = async {
            let response = self.client.execute(request).await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled { endpoint }),
            result = exchange => match result {
                Ok((status, body)) => {
                    debug!(endpoint = %endpoint, status = status.as_u16(), "Received response");
                    Ok(HttpResponse { status, body, endpoint })
                }
                Err(e) => Err(TransportError::Failed {
                    message: e.without_url().to_string(),
                    endpoint,
                }),
            },
        }
    }
}

/// Render a URL for logs and errors without credentials, query or fragment.
pub fn redact(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.set_fragment(None);
    let _ = clean.set_password(None);
    let _ = clean.set_username("");
    clean.to_string()
}

/// Parse a URL and join `path` onto it, keeping any path prefix of `base`.
pub(crate) fn join_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    url.set_path(&format!("{prefix}/{}", path.trim_start_matches('/')));
    url.set_query(None);
    url
}
