//! Static channel configuration.
//!
//! Every struct deserializes from a receiver entry in a config file and can
//! also be built in code. URLs are kept as strings here and parsed when the
//! channel is constructed.

use serde::Deserialize;
use url::Url;

use crate::error::{DispatchError, Result};
use crate::payload::{ActionButton, ButtonOrientation};
use crate::secret::Secret;
use crate::template::{DEFAULT_BODY_TEMPLATE, DEFAULT_TITLE_TEMPLATE};

/// Default corp API base URL.
pub const DEFAULT_CORP_API_URL: &str = "https://oapi.dingtalk.com";

/// Default signed voice API base URL.
pub const DEFAULT_SIGNED_VOICE_URL: &str = "https://app.cloopen.com:8883";

/// Default signed voice API version.
pub const DEFAULT_SIGNED_VOICE_VERSION: &str = "2013-12-26";

/// Default callee country code.
pub const DEFAULT_COUNTRY_CODE: &str = "+86";

fn default_title() -> String {
    DEFAULT_TITLE_TEMPLATE.to_string()
}

fn default_body() -> String {
    DEFAULT_BODY_TEMPLATE.to_string()
}

fn default_voice_parameter() -> String {
    "1".to_string()
}

fn default_corp_api_url() -> String {
    DEFAULT_CORP_API_URL.to_string()
}

fn default_signed_voice_url() -> String {
    DEFAULT_SIGNED_VOICE_URL.to_string()
}

fn default_signed_voice_version() -> String {
    DEFAULT_SIGNED_VOICE_VERSION.to_string()
}

fn default_country_code() -> String {
    DEFAULT_COUNTRY_CODE.to_string()
}

/// Parse a configured URL. The value is left out of the error since some
/// URLs carry credentials.
pub fn parse_url(field: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| DispatchError::Config(format!("invalid {field}: {e}")))
}

/// Configuration of one channel, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelConfig {
    /// Chat robot webhook.
    Robot(RobotConfig),
    /// Corp app message.
    AppMessage(AppMessageConfig),
    /// Voice call with app-key login tokens.
    TokenVoice(TokenVoiceConfig),
    /// Voice call with signed requests.
    SignedVoice(SignedVoiceConfig),
}

impl ChannelConfig {
    /// The `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Robot(_) => "robot",
            Self::AppMessage(_) => "app_message",
            Self::TokenVoice(_) => "token_voice",
            Self::SignedVoice(_) => "signed_voice",
        }
    }

    /// Title and body templates.
    pub fn templates(&self) -> (&str, &str) {
        match self {
            Self::Robot(c) => (&c.title, &c.body),
            Self::AppMessage(c) => (&c.title, &c.body),
            Self::TokenVoice(c) => (&c.title, &c.body),
            Self::SignedVoice(c) => (&c.title, &c.body),
        }
    }

    /// On-call roster.
    pub fn roster(&self) -> &[String] {
        match self {
            Self::Robot(c) => &c.roster,
            Self::AppMessage(c) => &c.roster,
            Self::TokenVoice(c) => &c.roster,
            Self::SignedVoice(c) => &c.roster,
        }
    }
}

/// Robot message kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotMessageKind {
    /// Markdown message.
    #[default]
    Markdown,
    /// Action card with buttons.
    ActionCard,
}

/// Chat robot webhook configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RobotConfig {
    /// Webhook URL, including its access token.
    pub webhook_url: Secret,
    /// Title template.
    #[serde(default = "default_title")]
    pub title: String,
    /// Body template.
    #[serde(default = "default_body")]
    pub body: String,
    /// On-call roster, tagged in the message.
    #[serde(default)]
    pub roster: Vec<String>,
    /// Message kind.
    #[serde(default)]
    pub message: RobotMessageKind,
    /// Action card buttons.
    #[serde(default)]
    pub buttons: Vec<ActionButton>,
    /// Hide the robot avatar on action cards.
    #[serde(default)]
    pub hide_avatar: bool,
    /// Action card button layout.
    #[serde(default)]
    pub button_orientation: ButtonOrientation,
    /// Tag everyone in the chat.
    #[serde(default)]
    pub mention_all: bool,
}

impl RobotConfig {
    /// Markdown robot posting to `webhook_url`.
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: Secret::new(webhook_url),
            title: default_title(),
            body: default_body(),
            roster: Vec::new(),
            message: RobotMessageKind::Markdown,
            buttons: Vec::new(),
            hide_avatar: false,
            button_orientation: ButtonOrientation::default(),
            mention_all: false,
        }
    }

    /// Set the templates.
    pub fn templates(mut self, title: impl Into<String>, body: impl Into<String>) -> Self {
        self.title = title.into();
        self.body = body.into();
        self
    }

    /// Set the roster.
    pub fn roster(mut self, roster: Vec<String>) -> Self {
        self.roster = roster;
        self
    }

    /// Send an action card with `buttons`.
    pub fn action_card(mut self, buttons: Vec<ActionButton>) -> Self {
        self.message = RobotMessageKind::ActionCard;
        self.buttons = buttons;
        self
    }

    /// Hide the avatar on action cards.
    pub fn hide_avatar(mut self, hide: bool) -> Self {
        self.hide_avatar = hide;
        self
    }

    /// Set the button layout.
    pub fn button_orientation(mut self, orientation: ButtonOrientation) -> Self {
        self.button_orientation = orientation;
        self
    }

    /// Tag everyone.
    pub fn mention_all(mut self, mention_all: bool) -> Self {
        self.mention_all = mention_all;
        self
    }
}

/// Corp app message configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppMessageConfig {
    /// API base URL.
    #[serde(default = "default_corp_api_url")]
    pub base_url: String,
    /// Corp id.
    pub corp_id: String,
    /// Corp secret.
    pub corp_secret: Secret,
    /// Application agent id.
    pub agent_id: String,
    /// Title template.
    #[serde(default = "default_title")]
    pub title: String,
    /// Body template.
    #[serde(default = "default_body")]
    pub body: String,
    /// Recipient user ids.
    #[serde(default)]
    pub roster: Vec<String>,
}

impl AppMessageConfig {
    /// App message configuration against the default API.
    pub fn new(corp_id: impl Into<String>, corp_secret: impl Into<Secret>, agent_id: impl Into<String>) -> Self {
        Self {
            base_url: default_corp_api_url(),
            corp_id: corp_id.into(),
            corp_secret: corp_secret.into(),
            agent_id: agent_id.into(),
            title: default_title(),
            body: default_body(),
            roster: Vec::new(),
        }
    }

    /// Set the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the templates.
    pub fn templates(mut self, title: impl Into<String>, body: impl Into<String>) -> Self {
        self.title = title.into();
        self.body = body.into();
        self
    }

    /// Set the recipients.
    pub fn roster(mut self, roster: Vec<String>) -> Self {
        self.roster = roster;
        self
    }
}

/// Token voice call configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenVoiceConfig {
    /// API base URL.
    pub base_url: String,
    /// Application key.
    pub app_key: String,
    /// Application secret, used for refresh.
    pub app_secret: Secret,
    /// Login username.
    pub username: String,
    /// `Authorization` header value for login.
    pub authorization: Secret,
    /// Caller id.
    pub display_number: String,
    /// Voice template id.
    pub template_id: String,
    /// Prefix added to every callee number.
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// Title template, rendered for logs.
    #[serde(default = "default_title")]
    pub title: String,
    /// Body template, rendered into the single template parameter.
    #[serde(default = "default_voice_parameter")]
    pub body: String,
    /// Callee numbers.
    #[serde(default)]
    pub roster: Vec<String>,
}

impl TokenVoiceConfig {
    /// Token voice configuration.
    pub fn new(
        base_url: impl Into<String>,
        app_key: impl Into<String>,
        app_secret: impl Into<Secret>,
        username: impl Into<String>,
        authorization: impl Into<Secret>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            username: username.into(),
            authorization: authorization.into(),
            display_number: String::new(),
            template_id: String::new(),
            country_code: default_country_code(),
            title: default_title(),
            body: default_voice_parameter(),
            roster: Vec::new(),
        }
    }

    /// Set caller id and voice template.
    pub fn call(mut self, display_number: impl Into<String>, template_id: impl Into<String>) -> Self {
        self.display_number = display_number.into();
        self.template_id = template_id.into();
        self
    }

    /// Set the callee country code.
    pub fn country_code(mut self, code: impl Into<String>) -> Self {
        self.country_code = code.into();
        self
    }

    /// Set the templates.
    pub fn templates(mut self, title: impl Into<String>, body: impl Into<String>) -> Self {
        self.title = title.into();
        self.body = body.into();
        self
    }

    /// Set the callees.
    pub fn roster(mut self, roster: Vec<String>) -> Self {
        self.roster = roster;
        self
    }
}

/// Signed voice call configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SignedVoiceConfig {
    /// API base URL.
    #[serde(default = "default_signed_voice_url")]
    pub base_url: String,
    /// API version path segment.
    #[serde(default = "default_signed_voice_version")]
    pub version: String,
    /// Account id.
    pub account_sid: String,
    /// Account token, used only for signing.
    pub account_token: Secret,
    /// Application id.
    pub app_id: String,
    /// Caller id.
    #[serde(default)]
    pub display_number: String,
    /// Title template, rendered for logs.
    #[serde(default = "default_title")]
    pub title: String,
    /// Body template, read out to the callee.
    #[serde(default = "default_title")]
    pub body: String,
    /// Callee numbers.
    #[serde(default)]
    pub roster: Vec<String>,
}

impl SignedVoiceConfig {
    /// Signed voice configuration against the default API.
    pub fn new(account_sid: impl Into<String>, account_token: impl Into<Secret>, app_id: impl Into<String>) -> Self {
        Self {
            base_url: default_signed_voice_url(),
            version: default_signed_voice_version(),
            account_sid: account_sid.into(),
            account_token: account_token.into(),
            app_id: app_id.into(),
            display_number: String::new(),
            title: default_title(),
            body: default_title(),
            roster: Vec::new(),
        }
    }

    /// Set the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the caller id.
    pub fn display_number(mut self, number: impl Into<String>) -> Self {
        self.display_number = number.into();
        self
    }

    /// Set the templates.
    pub fn templates(mut self, title: impl Into<String>, body: impl Into<String>) -> Self {
        self.title = title.into();
        self.body = body.into();
        self
    }

    /// Set the callees.
    pub fn roster(mut self, roster: Vec<String>) -> Self {
        self.roster = roster;
        self
    }
}
