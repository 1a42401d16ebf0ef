//! Receiver configuration for alertwire.
//!
//! Loads a list of named receivers from a JSON or TOML file, replaces
//! `${VAR}` references with environment variables, validates every channel
//! and builds a [`Dispatcher`] that shares one HTTP transport.
//!
//! ```toml
//! [http]
//! timeout_secs = 10
//!
//! [[receivers]]
//! name = "ops-chat"
//! type = "robot"
//! webhook_url = "https://oapi.dingtalk.com/robot/send?access_token=${OPS_ROBOT_TOKEN}"
//! roster = ["13800000000"]
//! ```

pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use env::{Interpolator, load_dotenv};
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};

use alertwire_notify::{
    Channel, ChannelConfig, DispatchError, Dispatcher, TemplateRenderer, Transport,
    TransportConfig,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Shared HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub pool_idle_timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
    /// Overrides the default `alertwire/<version>` user agent.
    pub user_agent: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        let defaults = TransportConfig::default();
        Self {
            timeout_secs: defaults.timeout.as_secs(),
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            pool_idle_timeout_secs: defaults.pool_idle_timeout.as_secs(),
            pool_max_idle_per_host: defaults.pool_max_idle_per_host,
            user_agent: None,
        }
    }
}

impl HttpSettings {
    pub fn transport_config(&self) -> TransportConfig {
        let builder = TransportConfig::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(self.pool_idle_timeout_secs))
            .pool_max_idle_per_host(self.pool_max_idle_per_host);

        match &self.user_agent {
            Some(user_agent) => builder.user_agent(user_agent.as_str()).build(),
            None => builder.build(),
        }
    }
}

impl Validate for HttpSettings {
    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "http timeouts must be at least one second".to_string(),
            ));
        }
        if let Some(user_agent) = &self.user_agent {
            ConfigValidator::not_empty(user_agent, "http.user_agent")?;
        }
        Ok(())
    }
}

/// One named receiver. The channel fields sit next to `name`, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiverConfig {
    pub name: String,
    #[serde(flatten)]
    pub channel: ChannelConfig,
}

impl Validate for ReceiverConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::not_empty(&self.name, "receiver name")?;
        self.channel.validate().map_err(|e| match e {
            ConfigError::ValidationError(message) => ConfigError::ValidationError(format!(
                "receiver '{}' ({}): {}",
                self.name,
                self.channel.kind(),
                message
            )),
            other => other,
        })
    }
}

/// Top-level notifier configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub receivers: Vec<ReceiverConfig>,
}

impl NotifierConfig {
    /// Load a file, interpolating from the process environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(path, &Interpolator::from_env())
    }

    /// Load a file with a custom interpolator.
    pub fn load_with(path: impl AsRef<Path>, interpolator: &Interpolator) -> Result<Self> {
        let path = path.as_ref();
        let value = ConfigLoader::auto(path)?.load_file(path)?;
        debug!(path = %path.display(), "Loaded notifier configuration");
        Self::from_value(value, interpolator)
    }

    /// Parse configuration text.
    pub fn parse(content: &str, format: FileFormat, interpolator: &Interpolator) -> Result<Self> {
        let value = ConfigLoader::new(format).parse(content)?;
        Self::from_value(value, interpolator)
    }

    /// Interpolate, deserialize and validate a configuration tree.
    pub fn from_value(value: serde_json::Value, interpolator: &Interpolator) -> Result<Self> {
        let value = interpolator.interpolate(value)?;
        let config: Self =
            serde_json::from_value(value).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Build the shared transport and one channel per receiver.
    pub fn build(self, renderer: Arc<dyn TemplateRenderer>) -> Result<Dispatcher> {
        self.validate()?;

        let transport =
            Transport::new(self.http.transport_config()).map_err(DispatchError::from)?;

        let mut dispatcher = Dispatcher::new();
        for receiver in self.receivers {
            debug!(
                receiver = %receiver.name,
                channel = receiver.channel.kind(),
                "Building receiver"
            );
            let channel =
                Channel::from_config(receiver.channel, transport.clone(), Arc::clone(&renderer))?;
            dispatcher.add(receiver.name, channel);
        }

        info!(receivers = dispatcher.len(), "Dispatcher ready");
        Ok(dispatcher)
    }
}

impl Validate for NotifierConfig {
    fn validate(&self) -> Result<()> {
        self.http.validate()?;
        ConfigValidator::not_empty_list(&self.receivers, "receivers")?;

        let mut seen = HashSet::new();
        for receiver in &self.receivers {
            receiver.validate()?;
            if !seen.insert(receiver.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate receiver name '{}'",
                    receiver.name
                )));
            }
        }
        Ok(())
    }
}
