use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use super::{FanoutReport, NotificationChannel, Pipeline, log_outcome};
use crate::alert::Alert;
use crate::classify::classify;
use crate::config::{TokenVoiceConfig, parse_url};
use crate::credentials::{CredentialManager, FastLoginAuthenticator, TokenState};
use crate::error::{DispatchError, DispatchResult, Result};
use crate::payload::{CallNotifyRequest, call_notify_url};
use crate::template::TemplateRenderer;
use crate::transport::Transport;

#[derive(Debug, Deserialize)]
struct CallNotifyResponse {
    #[serde(default)]
    resultcode: Option<String>,
    #[serde(default)]
    resultdesc: String,
}

/// Places template voice calls, one per roster entry, using login tokens.
#[derive(Debug)]
pub struct TokenVoiceChannel {
    base_url: Url,
    app_key: String,
    display_number: String,
    template_id: String,
    country_code: String,
    pipeline: Pipeline,
    credentials: CredentialManager<FastLoginAuthenticator>,
    transport: Transport,
}

impl TokenVoiceChannel {
    /// Create a token voice channel.
    pub fn new(
        config: TokenVoiceConfig,
        transport: Transport,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Result<Self> {
        let base_url = parse_url("base_url", &config.base_url)?;
        let authenticator = FastLoginAuthenticator::new(
            base_url.clone(),
            config.app_key.clone(),
            config.app_secret,
            config.username,
            config.authorization,
        );
        Ok(Self {
            base_url,
            app_key: config.app_key,
            display_number: config.display_number,
            template_id: config.template_id,
            country_code: config.country_code,
            pipeline: Pipeline::new(config.roster, renderer, config.title, config.body),
            credentials: CredentialManager::new(authenticator, transport.clone()),
            transport,
        })
    }

    /// Replace the token state, e.g. to resume with a token issued earlier.
    pub fn with_token_state(mut self, state: TokenState) -> Self {
        let authenticator = self.credentials.authenticator().clone();
        self.credentials = CredentialManager::with_state(authenticator, self.transport.clone(), state);
        self
    }

    /// Token state of this channel.
    pub fn credentials(&self) -> &CredentialManager<FastLoginAuthenticator> {
        &self.credentials
    }

    /// Call every roster entry in order and report each outcome.
    ///
    /// Errors before the first call (templates, token) and cancellation
    /// are returned as `Err`; everything else is recorded in the report.
    pub async fn deliver(&self, cancel: &CancellationToken, alerts: &[Alert]) -> Result<FanoutReport> {
        let (_batch, rendered) = self.pipeline.prepare(alerts)?;
        let access_token = self.credentials.access_token(cancel).await?;

        info!(
            channel = self.kind(),
            title = %rendered.title,
            recipients = self.pipeline.roster().len(),
            "Placing voice calls"
        );

        let mut report = FanoutReport::default();
        for recipient in self.pipeline.roster() {
            let request = CallNotifyRequest::new(
                self.display_number.as_str(),
                &self.country_code,
                recipient,
                self.template_id.as_str(),
                vec![rendered.body.clone()],
            );

            match self.call(cancel, &access_token, &request).await {
                Err(e) if e.is_cancelled() => return Err(e),
                result => report.record(recipient.as_str(), result),
            }
        }

        Ok(report)
    }

    async fn call(
        &self,
        cancel: &CancellationToken,
        access_token: &str,
        body: &CallNotifyRequest,
    ) -> DispatchResult {
        debug!(channel = self.kind(), callee = %body.callee_number, "Calling");

        let url = call_notify_url(&self.base_url, &self.app_key, access_token);
        let request = self.transport.post(url).json(body);
        let response = classify(self.transport.execute(request, cancel).await)?;

        if let Ok(result) = response.json::<CallNotifyResponse>()
            && let Some(code) = result.resultcode
            && code != "0"
        {
            return Err(DispatchError::Rejected {
                endpoint: response.endpoint,
                message: format!("resultcode {code}: {}", result.resultdesc),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for TokenVoiceChannel {
    fn kind(&self) -> &'static str {
        "token_voice"
    }

    async fn notify(&self, cancel: &CancellationToken, alerts: &[Alert]) -> DispatchResult {
        let result = self.deliver(cancel, alerts).await.map(|report| {
            report.log_failures(self.kind());
        });
        log_outcome(self.kind(), &result);
        result
    }
}
