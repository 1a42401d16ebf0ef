//! Wire payloads and request URLs for every channel.
//!
//! Field names follow the remote APIs, so most fields carry an explicit
//! `serde(rename)`.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::alert::AnnotatedAlert;
use crate::signer::SignedCredentials;
use crate::transport::join_path;

/// Call notify path, relative to the API base URL.
pub const CALL_NOTIFY_PATH: &str = "/rest/httpsessions/callnotify/v2.0";

/// Corp message send path, relative to the API base URL.
pub const APP_MESSAGE_PATH: &str = "/message/send";

/// Replays of a landing call message.
pub const PLAY_TIMES: &str = "3";

/// Markdown content, shared by robot and app messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownContent {
    /// Title shown in notification previews.
    pub title: String,
    /// Markdown text.
    pub text: String,
}

/// A button on an action card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionButton {
    /// Button label.
    pub title: String,
    /// Link opened by the button.
    #[serde(rename = "actionURL")]
    pub action_url: String,
}

impl ActionButton {
    /// Create a button.
    pub fn new(title: impl Into<String>, action_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            action_url: action_url.into(),
        }
    }
}

/// Button layout of an action card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonOrientation {
    /// Buttons stacked.
    #[default]
    #[serde(rename = "0", alias = "vertical")]
    Vertical,
    /// Buttons side by side.
    #[serde(rename = "1", alias = "horizontal")]
    Horizontal,
}

/// Action card content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionCardContent {
    /// Card title.
    pub title: String,
    /// Markdown text.
    pub text: String,
    /// Buttons below the text.
    #[serde(rename = "btns")]
    pub buttons: Vec<ActionButton>,
    /// Hide the robot avatar.
    #[serde(rename = "hideAvatar", with = "flag")]
    pub hide_avatar: bool,
    /// Button layout.
    #[serde(rename = "btnOrientation")]
    pub button_orientation: ButtonOrientation,
}

/// The robot message, discriminated by `msgtype`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "msgtype")]
pub enum RobotMessage {
    /// Plain markdown message.
    #[serde(rename = "markdown")]
    Markdown {
        /// Content.
        markdown: MarkdownContent,
    },
    /// Card with buttons.
    #[serde(rename = "actionCard")]
    ActionCard {
        /// Content.
        #[serde(rename = "actionCard")]
        action_card: ActionCardContent,
    },
}

impl RobotMessage {
    /// The `msgtype` value.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Markdown { .. } => "markdown",
            Self::ActionCard { .. } => "actionCard",
        }
    }

    fn text_mut(&mut self) -> &mut String {
        match self {
            Self::Markdown { markdown } => &mut markdown.text,
            Self::ActionCard { action_card } => &mut action_card.text,
        }
    }
}

/// Users tagged by a robot message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MentionBlock {
    /// Tagged users.
    #[serde(rename = "atMobiles")]
    pub mentioned_users: Vec<String>,
    /// Tag everyone in the chat.
    #[serde(rename = "isAtAll")]
    pub mention_all: bool,
}

/// Complete robot webhook body.
#[derive(Debug, Clone, Serialize)]
pub struct RobotPayload {
    /// Message content with its `msgtype`.
    #[serde(flatten)]
    pub message: RobotMessage,
    /// Mention block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<MentionBlock>,
    /// The alerts the message was rendered from.
    pub alerts: Vec<AnnotatedAlert>,
}

impl RobotPayload {
    /// Markdown message.
    pub fn markdown(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(RobotMessage::Markdown {
            markdown: MarkdownContent {
                title: title.into(),
                text: text.into(),
            },
        })
    }

    /// Action card message.
    pub fn action_card(
        title: impl Into<String>,
        text: impl Into<String>,
        buttons: Vec<ActionButton>,
        hide_avatar: bool,
        button_orientation: ButtonOrientation,
    ) -> Self {
        Self::new(RobotMessage::ActionCard {
            action_card: ActionCardContent {
                title: title.into(),
                text: text.into(),
                buttons,
                hide_avatar,
                button_orientation,
            },
        })
    }

    fn new(message: RobotMessage) -> Self {
        Self {
            message,
            at: None,
            alerts: Vec::new(),
        }
    }

    /// Tag users and append the mention string to the text.
    ///
    /// Chat clients only highlight tagged users whose mention also appears
    /// in the text.
    pub fn mention(mut self, users: Vec<String>, mention: Option<&str>, mention_all: bool) -> Self {
        if users.is_empty() && !mention_all {
            return self;
        }
        if let Some(mention) = mention.filter(|m| !m.is_empty()) {
            let text = self.message.text_mut();
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(mention);
        }
        self.at = Some(MentionBlock {
            mentioned_users: users,
            mention_all,
        });
        self
    }

    /// Embed the alert batch.
    pub fn alerts(mut self, alerts: Vec<AnnotatedAlert>) -> Self {
        self.alerts = alerts;
        self
    }
}

mod flag {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "1" } else { "0" })
    }
}

/// Corp app message body.
#[derive(Debug, Clone, Serialize)]
pub struct AppMessageRequest {
    /// Recipients joined by `|`.
    pub touser: String,
    /// Application agent id.
    pub agentid: String,
    /// Always `markdown`.
    pub msgtype: &'static str,
    /// Content.
    pub markdown: MarkdownContent,
}

impl AppMessageRequest {
    /// Markdown message to `recipients`.
    pub fn markdown(recipients: &[String], agent_id: impl Into<String>, content: MarkdownContent) -> Self {
        Self {
            touser: recipients.join("|"),
            agentid: agent_id.into(),
            msgtype: "markdown",
            markdown: content,
        }
    }
}

/// Corp API result envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct AppMessageResponse {
    /// Zero on success.
    #[serde(default)]
    pub errcode: i64,
    /// Error description.
    #[serde(default)]
    pub errmsg: String,
}

/// `{base}/message/send?access_token=..`.
pub fn app_message_url(base: &Url, access_token: &str) -> Url {
    let mut url = join_path(base, APP_MESSAGE_PATH);
    url.query_pairs_mut().append_pair("access_token", access_token);
    url
}

/// One voice template to play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayInfo {
    /// Voice template id.
    #[serde(rename = "templateId")]
    pub template_id: String,
    /// Template parameters.
    #[serde(rename = "templateParas")]
    pub template_parameters: Vec<String>,
    /// Whether to collect key presses; always off.
    #[serde(rename = "collectInd")]
    pub collect_indicator: u8,
}

/// Call notify body for one callee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallNotifyRequest {
    /// Caller id shown to the callee.
    #[serde(rename = "displayNbr")]
    pub display_number: String,
    /// Country-code-prefixed callee number.
    #[serde(rename = "calleeNbr")]
    pub callee_number: String,
    /// Templates to play.
    #[serde(rename = "playInfoList")]
    pub play_info: Vec<PlayInfo>,
}

impl CallNotifyRequest {
    /// Single-template call to `recipient`, prefixed with `country_code`.
    pub fn new(
        display_number: impl Into<String>,
        country_code: &str,
        recipient: &str,
        template_id: impl Into<String>,
        template_parameters: Vec<String>,
    ) -> Self {
        Self {
            display_number: display_number.into(),
            callee_number: format!("{country_code}{recipient}"),
            play_info: vec![PlayInfo {
                template_id: template_id.into(),
                template_parameters,
                collect_indicator: 0,
            }],
        }
    }
}

/// `{base}/rest/httpsessions/callnotify/v2.0?app_key=..&access_token=..`.
pub fn call_notify_url(base: &Url, app_key: &str, access_token: &str) -> Url {
    let mut url = join_path(base, CALL_NOTIFY_PATH);
    url.query_pairs_mut()
        .append_pair("app_key", app_key)
        .append_pair("access_token", access_token);
    url
}

/// Landing call body for one callee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LandingCallRequest {
    /// Callee number.
    pub to: String,
    /// Caller id shown to the callee.
    #[serde(rename = "displayNum")]
    pub display_number: String,
    /// Text read out to the callee.
    #[serde(rename = "mediaTxt")]
    pub media_text: String,
    /// Application id.
    #[serde(rename = "appId")]
    pub app_id: String,
    /// Replay count.
    #[serde(rename = "playTimes")]
    pub play_times: String,
}

impl LandingCallRequest {
    /// Call to `to` reading `media_text`.
    pub fn new(
        to: impl Into<String>,
        display_number: impl Into<String>,
        media_text: impl Into<String>,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            display_number: display_number.into(),
            media_text: media_text.into(),
            app_id: app_id.into(),
            play_times: PLAY_TIMES.to_string(),
        }
    }
}

/// Landing call result envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct LandingCallResponse {
    /// `000000` on success.
    #[serde(rename = "statusCode")]
    pub status_code: String,
    /// Error description.
    #[serde(rename = "statusMsg", default)]
    pub status_msg: String,
}

impl LandingCallResponse {
    /// Success code.
    pub const SUCCESS: &'static str = "000000";

    /// Check for the success code.
    pub fn is_success(&self) -> bool {
        self.status_code == Self::SUCCESS
    }
}

/// `{base}/{version}/Accounts/{sid}/Calls/LandingCalls?sig={signature}`.
pub fn landing_call_url(
    base: &Url,
    version: &str,
    account_sid: &str,
    signed: &SignedCredentials,
) -> Url {
    let mut url = join_path(
        base,
        &format!("{version}/Accounts/{account_sid}/Calls/LandingCalls"),
    );
    url.query_pairs_mut().append_pair("sig", &signed.signature);
    url
}
