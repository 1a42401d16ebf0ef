use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use super::{FanoutReport, NotificationChannel, Pipeline, log_outcome};
use crate::alert::Alert;
use crate::classify::classify;
use crate::config::{SignedVoiceConfig, parse_url};
use crate::error::{DispatchError, DispatchResult, Result};
use crate::payload::{LandingCallRequest, LandingCallResponse, landing_call_url};
use crate::signer::{RequestSigner, SignatureTimestamp};
use crate::template::TemplateRenderer;
use crate::transport::Transport;

const JSON_UTF8: &str = "application/json;charset=utf-8";

/// Places text-to-speech calls with per-request signatures.
#[derive(Debug)]
pub struct SignedVoiceChannel {
    base_url: Url,
    version: String,
    app_id: String,
    display_number: String,
    signer: RequestSigner,
    pipeline: Pipeline,
    transport: Transport,
}

impl SignedVoiceChannel {
    /// Create a signed voice channel.
    pub fn new(
        config: SignedVoiceConfig,
        transport: Transport,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Result<Self> {
        Ok(Self {
            base_url: parse_url("base_url", &config.base_url)?,
            version: config.version,
            app_id: config.app_id,
            display_number: config.display_number,
            signer: RequestSigner::new(config.account_sid, config.account_token),
            pipeline: Pipeline::new(config.roster, renderer, config.title, config.body),
            transport,
        })
    }

    /// Build the signed request for one callee from a captured timestamp.
    pub fn build_request(
        &self,
        timestamp: SignatureTimestamp,
        body: &LandingCallRequest,
    ) -> Result<reqwest::RequestBuilder> {
        let signed = self.signer.sign(timestamp);
        let url = landing_call_url(
            &self.base_url,
            &self.version,
            self.signer.account_sid(),
            &signed,
        );

        Ok(self
            .transport
            .post(url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, JSON_UTF8)
            .header(AUTHORIZATION, signed.authorization)
            .body(serde_json::to_vec(body)?))
    }

    /// Call every roster entry in order and report each outcome.
    ///
    /// Template errors and cancellation are returned as `Err`; everything
    /// else is recorded in the report.
    pub async fn deliver(&self, cancel: &CancellationToken, alerts: &[Alert]) -> Result<FanoutReport> {
        let (_batch, rendered) = self.pipeline.prepare(alerts)?;

        info!(
            channel = self.kind(),
            title = %rendered.title,
            recipients = self.pipeline.roster().len(),
            "Placing signed voice calls"
        );

        let mut report = FanoutReport::default();
        for recipient in self.pipeline.roster() {
            let body = LandingCallRequest::new(
                recipient.as_str(),
                self.display_number.as_str(),
                rendered.body.as_str(),
                self.app_id.as_str(),
            );

            match self.call(cancel, &body).await {
                Err(e) if e.is_cancelled() => return Err(e),
                result => report.record(recipient.as_str(), result),
            }
        }

        Ok(report)
    }

    async fn call(&self, cancel: &CancellationToken, body: &LandingCallRequest) -> DispatchResult {
        let timestamp = SignatureTimestamp::now();
        debug!(channel = self.kind(), callee = %body.to, timestamp = %timestamp, "Calling");

        let request = self.build_request(timestamp, body)?;
        let response = classify(self.transport.execute(request, cancel).await)?;

        let result: LandingCallResponse =
            response
                .json()
                .map_err(|e| DispatchError::MalformedResponse {
                    endpoint: response.endpoint.clone(),
                    message: e.to_string(),
                })?;
        if !result.is_success() {
            return Err(DispatchError::Rejected {
                endpoint: response.endpoint,
                message: format!("statusCode {}: {}", result.status_code, result.status_msg),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for SignedVoiceChannel {
    fn kind(&self) -> &'static str {
        "signed_voice"
    }

    async fn notify(&self, cancel: &CancellationToken, alerts: &[Alert]) -> DispatchResult {
        let result = self.deliver(cancel, alerts).await.map(|report| {
            report.log_failures(self.kind());
        });
        log_outcome(self.kind(), &result);
        result
    }
}
