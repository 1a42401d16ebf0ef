use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::{NotificationChannel, Pipeline, log_outcome};
use crate::alert::Alert;
use crate::classify::classify;
use crate::config::{AppMessageConfig, parse_url};
use crate::credentials::{CorpTokenAuthenticator, CredentialManager};
use crate::error::{DispatchError, DispatchResult, Result};
use crate::payload::{AppMessageRequest, AppMessageResponse, MarkdownContent, app_message_url};
use crate::template::TemplateRenderer;
use crate::transport::Transport;

/// Sends markdown app messages through the corp messaging API.
#[derive(Debug)]
pub struct AppMessageChannel {
    base_url: Url,
    agent_id: String,
    pipeline: Pipeline,
    credentials: CredentialManager<CorpTokenAuthenticator>,
    transport: Transport,
}

impl AppMessageChannel {
    /// Create an app message channel.
    pub fn new(
        config: AppMessageConfig,
        transport: Transport,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Result<Self> {
        let base_url = parse_url("base_url", &config.base_url)?;
        let authenticator =
            CorpTokenAuthenticator::new(base_url.clone(), config.corp_id, config.corp_secret);

        Ok(Self {
            base_url,
            agent_id: config.agent_id,
            pipeline: Pipeline::new(config.roster, renderer, config.title, config.body),
            credentials: CredentialManager::new(authenticator, transport.clone()),
            transport,
        })
    }

    /// Token state of this channel.
    pub fn credentials(&self) -> &CredentialManager<CorpTokenAuthenticator> {
        &self.credentials
    }

    async fn send(&self, cancel: &CancellationToken, alerts: &[Alert]) -> DispatchResult {
        let (_batch, rendered) = self.pipeline.prepare(alerts)?;
        let access_token = self.credentials.access_token(cancel).await?;

        let body = AppMessageRequest::markdown(
            self.pipeline.roster(),
            self.agent_id.as_str(),
            MarkdownContent {
                title: rendered.title,
                text: rendered.body,
            },
        );

        debug!(
            channel = self.kind(),
            recipients = %body.touser,
            "Sending app message"
        );

        let request = self
            .transport
            .post(app_message_url(&self.base_url, &access_token))
            .json(&body);
        let response = classify(self.transport.execute(request, cancel).await)?;

        let result: AppMessageResponse =
            response
                .json()
                .map_err(|e| DispatchError::MalformedResponse {
                    endpoint: response.endpoint.clone(),
                    message: e.to_string(),
                })?;
        if result.errcode != 0 {
            return Err(DispatchError::Rejected {
                endpoint: response.endpoint,
                message: format!("errcode {}: {}", result.errcode, result.errmsg),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for AppMessageChannel {
    fn kind(&self) -> &'static str {
        "app_message"
    }

    async fn notify(&self, cancel: &CancellationToken, alerts: &[Alert]) -> DispatchResult {
        let result = self.send(cancel, alerts).await;
        log_outcome(self.kind(), &result);
        result
    }
}
