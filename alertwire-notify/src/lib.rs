//! # Alertwire Notify
//!
//! Delivers batches of already-evaluated alerts to chat robots, corp app
//! messaging and voice call APIs.
//!
//! ## Features
//!
//! - **Robot webhooks**: markdown or action card messages with @-mentions
//! - **App messages**: corp messaging with cached access tokens
//! - **Token voice calls**: app-key login, refresh before the token ages out
//! - **Signed voice calls**: MD5-signed URLs with a matching auth header
//! - **One retry contract**: every failure says whether a retry can help
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use alertwire_notify::prelude::*;
//! use std::sync::Arc;
//!
//! let transport = Transport::default_transport()?;
//! let renderer = Arc::new(HandlebarsRenderer::new());
//!
//! let channel = RobotChannel::new(
//!     RobotConfig::new("https://oapi.example.com/robot/send?access_token=...")
//!         .roster(vec!["alice".into()]),
//!     transport,
//!     renderer,
//! )?;
//!
//! let cancel = CancellationToken::new();
//! let (retryable, error) = channel.notify(&cancel, &alerts).await.into_parts();
//! ```
//!
//! ## Token channels
//!
//! App message and token voice channels own a [`CredentialManager`]. The
//! token is acquired on first use and renewed once it reaches a fixed age.
//! Concurrent `notify` calls on one channel share a single renewal.

mod alert;
mod annotate;
mod channel;
mod classify;
mod config;
mod credentials;
mod dispatcher;
mod error;
mod payload;
mod secret;
mod signer;
mod template;
mod transport;

pub use alert::{Alert, AnnotatedAlert};
pub use annotate::{AnnotatedBatch, EscalationAnnotator, ONCALL_LABEL};
pub use channel::{
    AppMessageChannel, Channel, FanoutReport, NotificationChannel, Pipeline, RecipientOutcome,
    RobotChannel, SignedVoiceChannel, TokenVoiceChannel,
};
pub use classify::{classify, classify_status, is_retryable_status};
pub use config::{
    AppMessageConfig, ChannelConfig, DEFAULT_CORP_API_URL, DEFAULT_COUNTRY_CODE,
    DEFAULT_SIGNED_VOICE_URL, DEFAULT_SIGNED_VOICE_VERSION, RobotConfig, RobotMessageKind,
    SignedVoiceConfig, TokenVoiceConfig, parse_url,
};
pub use credentials::{
    Authenticator, CORP_REFRESH_AFTER, CorpTokenAuthenticator, CredentialError,
    CredentialManager, DEFAULT_REFRESH_AFTER, FAST_LOGIN_PATH, FastLoginAuthenticator,
    IssuedToken, REFRESH_PATH, Renewal, TokenState,
};
pub use dispatcher::{Dispatcher, ReceiverOutcome};
pub use error::{DispatchError, DispatchOutcome, DispatchResult, Result};
pub use payload::{
    APP_MESSAGE_PATH, ActionButton, ActionCardContent, AppMessageRequest, AppMessageResponse,
    ButtonOrientation, CALL_NOTIFY_PATH, CallNotifyRequest, LandingCallRequest,
    LandingCallResponse, MarkdownContent, MentionBlock, PLAY_TIMES, PlayInfo, RobotMessage,
    RobotPayload, app_message_url, call_notify_url, landing_call_url,
};
pub use secret::Secret;
pub use signer::{RequestSigner, SignatureTimestamp, SignedCredentials, TIMESTAMP_FORMAT};
pub use template::{
    DEFAULT_BODY_TEMPLATE, DEFAULT_TITLE_TEMPLATE, RenderedMessage, TemplateContext,
    TemplateError, TemplateRenderer,
};
pub use tokio_util::sync::CancellationToken;
pub use transport::{
    HttpResponse, Transport, TransportConfig, TransportConfigBuilder, TransportError, redact,
};

#[cfg(feature = "handlebars")]
pub use template::HandlebarsRenderer;

/// Prelude for common imports.
///
/// ```
/// use alertwire_notify::prelude::*;
/// ```
pub mod prelude {
    pub use crate::alert::Alert;
    pub use crate::channel::{Channel, NotificationChannel, RobotChannel};
    pub use crate::config::{
        AppMessageConfig, ChannelConfig, RobotConfig, SignedVoiceConfig, TokenVoiceConfig,
    };
    pub use crate::dispatcher::Dispatcher;
    pub use crate::error::{DispatchError, DispatchOutcome, DispatchResult};
    pub use crate::template::{RenderedMessage, TemplateRenderer};
    pub use crate::transport::{Transport, TransportConfig};
    pub use tokio_util::sync::CancellationToken;

    #[cfg(feature = "handlebars")]
    pub use crate::template::HandlebarsRenderer;
}
