//! On-call roster injection.

use serde::Serialize;

use crate::alert::{Alert, AnnotatedAlert};

/// Label carrying the comma-joined on-call roster.
pub const ONCALL_LABEL: &str = "oncall";

/// Copies inbound alerts and tags them with the configured on-call roster.
#[derive(Debug, Clone, Default)]
pub struct EscalationAnnotator {
    roster: Vec<String>,
}

/// Annotated copies of one alert batch, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedBatch {
    /// One copy per inbound alert.
    pub alerts: Vec<AnnotatedAlert>,
    /// `@name` for every roster entry, concatenated; `None` without a roster.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mention: Option<String>,
}

impl AnnotatedBatch {
    /// Number of alerts in the batch.
    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

impl EscalationAnnotator {
    /// Create an annotator for the given roster.
    pub fn new(roster: Vec<String>) -> Self {
        Self { roster }
    }

    /// The configured roster.
    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    /// Value of the `oncall` label, `None` for an empty roster.
    pub fn oncall_label(&self) -> Option<String> {
        (!self.roster.is_empty()).then(|| self.roster.join(","))
    }

    /// Mention string for channels that support user tagging.
    pub fn mention(&self) -> Option<String> {
        (!self.roster.is_empty()).then(|| self.roster.iter().map(|name| format!("@{name}")).collect())
    }

    /// Produce independent copies of `alerts`, tagged with the roster.
    ///
    /// The copies own fresh label and annotation maps: changing them never
    /// shows up in the caller's alerts and the other way round.
    pub fn annotate(&self, alerts: &[Alert]) -> AnnotatedBatch {
        let oncall = self.oncall_label();

        let alerts = alerts
            .iter()
            .map(|alert| {
                let mut copy = alert.clone();
                if let Some(oncall) = &oncall {
                    copy.labels.insert(ONCALL_LABEL.to_string(), oncall.clone());
                }
                AnnotatedAlert::new(copy)
            })
            .collect();

        AnnotatedBatch {
            alerts,
            mention: self.mention(),
        }
    }
}
