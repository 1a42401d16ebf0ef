//! Named receivers.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::alert::Alert;
use crate::channel::{Channel, NotificationChannel};
use crate::error::{DispatchError, DispatchResult};

/// Outcome for one receiver.
#[derive(Debug)]
pub struct ReceiverOutcome {
    /// Receiver name.
    pub name: String,
    /// Delivery result.
    pub result: DispatchResult,
}

/// A set of named channels.
///
/// Receivers are notified one after the other on the caller's task.
#[derive(Debug, Default)]
pub struct Dispatcher {
    receivers: Vec<(String, Channel)>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a receiver.
    pub fn receiver(mut self, name: impl Into<String>, channel: impl Into<Channel>) -> Self {
        self.add(name, channel);
        self
    }

    /// Add a receiver in place.
    pub fn add(&mut self, name: impl Into<String>, channel: impl Into<Channel>) {
        self.receivers.push((name.into(), channel.into()));
    }

    /// Receiver names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.receivers.iter().map(|(name, _)| name.as_str())
    }

    /// Look up a receiver.
    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.receivers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, channel)| channel)
    }

    /// Number of receivers.
    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    /// Check if there are no receivers.
    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }

    /// Notify one receiver by name.
    pub async fn notify(
        &self,
        name: &str,
        cancel: &CancellationToken,
        alerts: &[Alert],
    ) -> DispatchResult {
        let channel = self
            .get(name)
            .ok_or_else(|| DispatchError::Config(format!("unknown receiver '{name}'")))?;
        channel.notify(cancel, alerts).await
    }

    /// Notify every receiver in order.
    pub async fn notify_all(&self, cancel: &CancellationToken, alerts: &[Alert]) -> Vec<ReceiverOutcome> {
        let mut outcomes = Vec::with_capacity(self.receivers.len());
        for (name, channel) in &self.receivers {
            debug!(receiver = %name, channel = channel.kind(), "Notifying receiver");
            outcomes.push(ReceiverOutcome {
                name: name.clone(),
                result: channel.notify(cancel, alerts).await,
            });
        }
        outcomes
    }
}
