//! Notification channels.
//!
//! Every channel runs the same pipeline: annotate, render, build the request,
//! sign or authenticate, send, classify. Only the build and auth steps
//! differ, so the shared steps live in [`Pipeline`] and the variants are
//! collected in the [`Channel`] enum.

mod app_message;
mod robot;
mod signed_voice;
mod token_voice;

pub use app_message::AppMessageChannel;
pub use robot::RobotChannel;
pub use signed_voice::SignedVoiceChannel;
pub use token_voice::TokenVoiceChannel;

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::alert::Alert;
use crate::annotate::{AnnotatedBatch, EscalationAnnotator};
use crate::config::ChannelConfig;
use crate::error::{DispatchError, DispatchResult, Result};
use crate::template::{RenderedMessage, TemplateRenderer};
use crate::transport::Transport;

/// A delivery mechanism.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Channel kind for logs.
    fn kind(&self) -> &'static str;

    /// Deliver one alert batch.
    ///
    /// `Ok(())` means delivered. On `Err`, [`DispatchError::is_retryable`]
    /// tells the caller whether trying again later can help.
    async fn notify(&self, cancel: &CancellationToken, alerts: &[Alert]) -> DispatchResult;
}

/// The annotate and render steps shared by all channels.
#[derive(Clone)]
pub struct Pipeline {
    annotator: EscalationAnnotator,
    renderer: Arc<dyn TemplateRenderer>,
    title_template: String,
    body_template: String,
}

impl Pipeline {
    /// Create a pipeline.
    pub fn new(
        roster: Vec<String>,
        renderer: Arc<dyn TemplateRenderer>,
        title_template: impl Into<String>,
        body_template: impl Into<String>,
    ) -> Self {
        Self {
            annotator: EscalationAnnotator::new(roster),
            renderer,
            title_template: title_template.into(),
            body_template: body_template.into(),
        }
    }

    /// The annotator.
    pub fn annotator(&self) -> &EscalationAnnotator {
        &self.annotator
    }

    /// The configured roster.
    pub fn roster(&self) -> &[String] {
        self.annotator.roster()
    }

    /// Annotate the alerts and render title and body.
    pub fn prepare(&self, alerts: &[Alert]) -> Result<(AnnotatedBatch, RenderedMessage)> {
        let batch = self.annotator.annotate(alerts);
        let rendered = self
            .renderer
            .render(&self.title_template, &self.body_template, &batch)?;
        Ok((batch, rendered))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("annotator", &self.annotator)
            .field("title_template", &self.title_template)
            .field("body_template", &self.body_template)
            .finish_non_exhaustive()
    }
}

/// Outcome of one recipient in a fan-out.
#[derive(Debug)]
pub struct RecipientOutcome {
    /// Recipient as configured.
    pub recipient: String,
    /// Delivery result.
    pub result: DispatchResult,
}

/// Per-recipient outcomes of a sequential fan-out.
#[derive(Debug, Default)]
pub struct FanoutReport {
    /// Outcomes in roster order.
    pub outcomes: Vec<RecipientOutcome>,
}

impl FanoutReport {
    /// Record an outcome.
    pub fn record(&mut self, recipient: impl Into<String>, result: DispatchResult) {
        self.outcomes.push(RecipientOutcome {
            recipient: recipient.into(),
            result,
        });
    }

    /// Recipients that were reached.
    pub fn delivered(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.recipient.as_str())
    }

    /// Recipients that failed, with their errors.
    pub fn failed(&self) -> impl Iterator<Item = (&str, &DispatchError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.recipient.as_str(), e)))
    }

    /// Check if every recipient was reached.
    pub fn all_delivered(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Log failed recipients and drop them. Per-recipient failures never
    /// become the channel result.
    pub(crate) fn log_failures(&self, channel: &'static str) {
        for (recipient, error) in self.failed() {
            warn!(
                channel,
                recipient,
                retryable = error.is_retryable(),
                error = %error,
                "Recipient delivery failed"
            );
        }
        debug!(
            channel,
            delivered = self.delivered().count(),
            total = self.outcomes.len(),
            "Fan-out finished"
        );
    }
}

/// All channel variants.
#[derive(Debug)]
pub enum Channel {
    /// Chat robot webhook.
    Robot(RobotChannel),
    /// Corp app message.
    AppMessage(AppMessageChannel),
    /// Voice call with login tokens.
    TokenVoice(TokenVoiceChannel),
    /// Voice call with signed requests.
    SignedVoice(SignedVoiceChannel),
}

impl Channel {
    /// Build a channel from configuration.
    pub fn from_config(
        config: ChannelConfig,
        transport: Transport,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Result<Self> {
        Ok(match config {
            ChannelConfig::Robot(c) => Self::Robot(RobotChannel::new(c, transport, renderer)?),
            ChannelConfig::AppMessage(c) => {
                Self::AppMessage(AppMessageChannel::new(c, transport, renderer)?)
            }
            ChannelConfig::TokenVoice(c) => {
                Self::TokenVoice(TokenVoiceChannel::new(c, transport, renderer)?)
            }
            ChannelConfig::SignedVoice(c) => {
                Self::SignedVoice(SignedVoiceChannel::new(c, transport, renderer)?)
            }
        })
    }
}

#[async_trait]
impl NotificationChannel for Channel {
    fn kind(&self) -> &'static str {
        match self {
            Self::Robot(c) => c.kind(),
            Self::AppMessage(c) => c.kind(),
            Self::TokenVoice(c) => c.kind(),
            Self::SignedVoice(c) => c.kind(),
        }
    }

    async fn notify(&self, cancel: &CancellationToken, alerts: &[Alert]) -> DispatchResult {
        match self {
            Self::Robot(c) => c.notify(cancel, alerts).await,
            Self::AppMessage(c) => c.notify(cancel, alerts).await,
            Self::TokenVoice(c) => c.notify(cancel, alerts).await,
            Self::SignedVoice(c) => c.notify(cancel, alerts).await,
        }
    }
}

impl From<RobotChannel> for Channel {
    fn from(channel: RobotChannel) -> Self {
        Self::Robot(channel)
    }
}

impl From<AppMessageChannel> for Channel {
    fn from(channel: AppMessageChannel) -> Self {
        Self::AppMessage(channel)
    }
}

impl From<TokenVoiceChannel> for Channel {
    fn from(channel: TokenVoiceChannel) -> Self {
        Self::TokenVoice(channel)
    }
}

impl From<SignedVoiceChannel> for Channel {
    fn from(channel: SignedVoiceChannel) -> Self {
        Self::SignedVoice(channel)
    }
}

/// Log a classified channel failure.
pub(crate) fn log_outcome(channel: &'static str, result: &DispatchResult) {
    match result {
        Ok(()) => debug!(channel, "Notification delivered"),
        Err(e) if e.is_retryable() => warn!(channel, error = %e, "Notification failed, retryable"),
        Err(e) => tracing::error!(channel, error = %e, "Notification failed permanently"),
    }
}
