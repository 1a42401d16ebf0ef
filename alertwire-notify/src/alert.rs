//! Alert snapshots handed over by the alerting pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// An alert as computed upstream.
///
/// Channels only ever read an `Alert`; anything they change is changed on an
/// [`AnnotatedAlert`] copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Identifying labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Descriptive annotations.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// When the alert started firing.
    pub starts_at: DateTime<Utc>,
    /// When the alert resolved, if it has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    /// Link back to the rule that generated the alert.
    #[serde(default, rename = "generatorURL")]
    pub generator_url: String,
    /// Last time the alert was updated upstream.
    pub updated_at: DateTime<Utc>,
    /// How long the alert stays active without being refreshed.
    #[serde(default, with = "duration_secs")]
    pub timeout: Duration,
}

impl Alert {
    /// Create an alert that started firing at `starts_at`.
    pub fn new(starts_at: DateTime<Utc>) -> Self {
        Self {
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            starts_at,
            ends_at: None,
            generator_url: String::new(),
            updated_at: starts_at,
            timeout: Duration::ZERO,
        }
    }

    /// Add a label.
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add an annotation.
    pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Set the resolve time.
    pub fn ends_at(mut self, ends_at: DateTime<Utc>) -> Self {
        self.ends_at = Some(ends_at);
        self
    }

    /// Set the generator URL.
    pub fn generator_url(mut self, url: impl Into<String>) -> Self {
        self.generator_url = url.into();
        self
    }

    /// Set the last update time.
    pub fn updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Alert name label, if present.
    pub fn name(&self) -> Option<&str> {
        self.labels.get("alertname").map(String::as_str)
    }

    /// Check if the alert had resolved by `now`.
    pub fn is_resolved_at(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.is_some_and(|ends_at| ends_at <= now)
    }
}

/// A per-notification copy of an [`Alert`], possibly carrying the injected
/// on-call label.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AnnotatedAlert(Alert);

impl AnnotatedAlert {
    pub(crate) fn new(alert: Alert) -> Self {
        Self(alert)
    }

    /// The underlying alert data.
    pub fn alert(&self) -> &Alert {
        &self.0
    }

    /// Labels, including the injected on-call label.
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.0.labels
    }

    /// Mutable labels of this copy.
    pub fn labels_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.0.labels
    }

    /// Mutable annotations of this copy.
    pub fn annotations_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.0.annotations
    }

    /// Look up a label.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.0.labels.get(key).map(String::as_str)
    }

    /// Comma-joined on-call roster, if one was injected.
    pub fn oncall(&self) -> Option<&str> {
        self.label(crate::annotate::ONCALL_LABEL)
    }

    /// Consume the copy.
    pub fn into_inner(self) -> Alert {
        self.0
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
