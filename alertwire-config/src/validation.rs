// Receiver configuration validation

use crate::{ConfigError, Result};
use alertwire_notify::{
    AppMessageConfig, ChannelConfig, RobotConfig, RobotMessageKind, Secret, SignedVoiceConfig,
    TokenVoiceConfig, parse_url,
};

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Field-level rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a secret is set
    pub fn secret(value: &Secret, field: &str) -> Result<()> {
        if value.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate URL format
    pub fn is_url(value: &str, field: &str) -> Result<()> {
        parse_url(field, value)
            .map(|_| ())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Validate that a list has at least one entry
    pub fn not_empty_list<T>(values: &[T], field: &str) -> Result<()> {
        if values.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} needs at least one entry",
                field
            )));
        }
        Ok(())
    }
}

impl Validate for RobotConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::secret(&self.webhook_url, "webhook_url")?;
        ConfigValidator::is_url(self.webhook_url.expose(), "webhook_url")?;
        if self.message == RobotMessageKind::ActionCard {
            ConfigValidator::not_empty_list(&self.buttons, "buttons")?;
        }
        Ok(())
    }
}

impl Validate for AppMessageConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::is_url(&self.base_url, "base_url")?;
        ConfigValidator::not_empty(&self.corp_id, "corp_id")?;
        ConfigValidator::secret(&self.corp_secret, "corp_secret")?;
        ConfigValidator::not_empty(&self.agent_id, "agent_id")?;
        ConfigValidator::not_empty_list(&self.roster, "roster")
    }
}

impl Validate for TokenVoiceConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::is_url(&self.base_url, "base_url")?;
        ConfigValidator::not_empty(&self.app_key, "app_key")?;
        ConfigValidator::secret(&self.app_secret, "app_secret")?;
        ConfigValidator::not_empty(&self.username, "username")?;
        ConfigValidator::secret(&self.authorization, "authorization")?;
        ConfigValidator::not_empty(&self.display_number, "display_number")?;
        ConfigValidator::not_empty(&self.template_id, "template_id")?;
        ConfigValidator::not_empty_list(&self.roster, "roster")
    }
}

impl Validate for SignedVoiceConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::is_url(&self.base_url, "base_url")?;
        ConfigValidator::not_empty(&self.version, "version")?;
        ConfigValidator::not_empty(&self.account_sid, "account_sid")?;
        ConfigValidator::secret(&self.account_token, "account_token")?;
        ConfigValidator::not_empty(&self.app_id, "app_id")?;
        ConfigValidator::not_empty_list(&self.roster, "roster")
    }
}

impl Validate for ChannelConfig {
    fn validate(&self) -> Result<()> {
        match self {
            ChannelConfig::Robot(c) => c.validate(),
            ChannelConfig::AppMessage(c) => c.validate(),
            ChannelConfig::TokenVoice(c) => c.validate(),
            ChannelConfig::SignedVoice(c) => c.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alertwire_notify::ActionButton;

    #[test]
    fn test_not_empty_validation() {
        assert!(ConfigValidator::not_empty("value", "field").is_ok());
        assert!(ConfigValidator::not_empty("", "field").is_err());
        assert!(ConfigValidator::not_empty("  ", "field").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert!(ConfigValidator::is_url("https://oapi.example.com", "field").is_ok());
        assert!(ConfigValidator::is_url("oapi.example.com", "field").is_err());
    }

    #[test]
    fn test_robot_rules() {
        assert!(RobotConfig::new("https://oapi.example.com/robot/send").validate().is_ok());
        assert!(RobotConfig::new("").validate().is_err());

        let card = RobotConfig::new("https://oapi.example.com/robot/send").action_card(vec![]);
        assert!(card.validate().is_err());

        let card = RobotConfig::new("https://oapi.example.com/robot/send")
            .action_card(vec![ActionButton::new("Open", "https://grafana")]);
        assert!(card.validate().is_ok());
    }

    #[test]
    fn test_robot_url_error_hides_value() {
        let err = RobotConfig::new("access_token=s3cret").validate().unwrap_err();
        assert!(!err.to_string().contains("s3cret"));
    }

    #[test]
    fn test_app_message_needs_recipients() {
        let config = AppMessageConfig::new("corp", "secret", "1");
        assert!(config.validate().is_err());
        assert!(config.roster(vec!["u1".into()]).validate().is_ok());
        assert!(
            AppMessageConfig::new("corp", "", "1")
                .roster(vec!["u1".into()])
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_token_voice_rules() {
        let config = TokenVoiceConfig::new("https://rtc.example.com", "k", "s", "ops", "Basic x")
            .roster(vec!["138".into()]);
        assert!(config.clone().validate().is_err());
        assert!(config.call("+861000", "tpl").validate().is_ok());
    }

    #[test]
    fn test_signed_voice_rules() {
        let config = SignedVoiceConfig::new("AC", "token", "app");
        assert!(config.clone().validate().is_err());
        assert!(config.roster(vec!["138".into()]).validate().is_ok());
        assert!(
            SignedVoiceConfig::new("AC", "token", "app")
                .base_url("::")
                .roster(vec!["138".into()])
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_channel_dispatch() {
        let config = ChannelConfig::Robot(RobotConfig::new("nope"));
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }
}
