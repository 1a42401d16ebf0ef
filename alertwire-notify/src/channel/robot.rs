use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::{NotificationChannel, Pipeline, log_outcome};
use crate::alert::Alert;
use crate::annotate::AnnotatedBatch;
use crate::classify::classify;
use crate::config::{RobotConfig, RobotMessageKind, parse_url};
use crate::error::{DispatchError, DispatchResult, Result};
use crate::payload::RobotPayload;
use crate::template::{RenderedMessage, TemplateRenderer};
use crate::transport::{Transport, redact};

#[derive(Debug, Deserialize)]
struct RobotResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// Posts markdown or action card messages to a chat robot webhook.
#[derive(Debug)]
pub struct RobotChannel {
    webhook_url: Url,
    endpoint: String,
    config: RobotConfig,
    pipeline: Pipeline,
    transport: Transport,
}

impl RobotChannel {
    /// Create a robot channel.
    pub fn new(
        config: RobotConfig,
        transport: Transport,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Result<Self> {
        let webhook_url = parse_url("webhook_url", config.webhook_url.expose())?;
        if config.message == RobotMessageKind::ActionCard && config.buttons.is_empty() {
            return Err(DispatchError::Config(
                "action card messages need at least one button".to_string(),
            ));
        }

        let pipeline = Pipeline::new(
            config.roster.clone(),
            renderer,
            config.title.clone(),
            config.body.clone(),
        );

        Ok(Self {
            endpoint: redact(&webhook_url),
            webhook_url,
            config,
            pipeline,
            transport,
        })
    }

    /// Build the webhook body.
    pub fn build_payload(&self, batch: AnnotatedBatch, rendered: RenderedMessage) -> RobotPayload {
        let payload = match self.config.message {
            RobotMessageKind::Markdown => RobotPayload::markdown(rendered.title, rendered.body),
            RobotMessageKind::ActionCard => RobotPayload::action_card(
                rendered.title,
                rendered.body,
                self.config.buttons.clone(),
                self.config.hide_avatar,
                self.config.button_orientation,
            ),
        };

        payload
            .mention(
                self.config.roster.clone(),
                batch.mention.as_deref(),
                self.config.mention_all,
            )
            .alerts(batch.alerts)
    }

    async fn send(&self, cancel: &CancellationToken, alerts: &[Alert]) -> DispatchResult {
        let (batch, rendered) = self.pipeline.prepare(alerts)?;
        let payload = self.build_payload(batch, rendered);

        debug!(
            channel = self.kind(),
            endpoint = %self.endpoint,
            msgtype = payload.message.kind(),
            alerts = payload.alerts.len(),
            "Posting robot message"
        );

        let request = self.transport.post(self.webhook_url.clone()).json(&payload);
        let response = classify(self.transport.execute(request, cancel).await)?;

        // Some robots answer 200 with an error code; an empty or non-JSON
        // body counts as success.
        if let Ok(body) = response.json::<RobotResponse>()
            && body.errcode != 0
        {
            return Err(DispatchError::Rejected {
                endpoint: response.endpoint,
                message: format!("errcode {}: {}", body.errcode, body.errmsg),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for RobotChannel {
    fn kind(&self) -> &'static str {
        "robot"
    }

    async fn notify(&self, cancel: &CancellationToken, alerts: &[Alert]) -> DispatchResult {
        let result = self.send(cancel, alerts).await;
        log_outcome(self.kind(), &result);
        result
    }
}
