//! Telegram transport settings.

use config::ConfigError;
use reclaim_core::config::RelaySettings;
use reclaim_core::gate::RequiredGroup;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramSettings {
    /// Telegram Bot API token (`TELEGRAM_TOKEN`, or `BOT_TOKEN`).
    #[serde(default, alias = "bot_token")]
    pub telegram_token: String,
    /// Comma-separated list of groups users must join.
    ///
    /// Public groups are given as `@username`, private ones as
    /// `-100123...|https://t.me/+invite` or a bare `-100123...`.
    #[serde(rename = "required_channels")]
    pub required_channels_str: Option<String>,
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Relay settings shared across transport handlers.
    pub relay: Arc<RelaySettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(relay: RelaySettings, telegram: TelegramSettings) -> Self {
        Self {
            relay: Arc::new(relay),
            telegram: Arc::new(telegram),
        }
    }
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails, the bot token is missing,
    /// or a required group entry is malformed.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = reclaim_core::config::build_config()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_token.trim().is_empty() {
            return Err(ConfigError::NotFound(
                "TELEGRAM_TOKEN (or BOT_TOKEN)".to_string(),
            ));
        }
        self.required_groups().map(|_| ())
    }

    /// Returns the required groups in configuration order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` naming the first entry that is not
    /// `@username`, a numeric chat id, or `id|https://invite_link`.
    pub fn required_groups(&self) -> Result<Vec<RequiredGroup>, ConfigError> {
        self.required_channels_str
            .as_deref()
            .map_or(Ok(Vec::new()), |s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .map(|token| {
                        parse_group(token).ok_or_else(|| {
                            ConfigError::Message(format!(
                                "invalid REQUIRED_CHANNELS entry '{token}'"
                            ))
                        })
                    })
                    .collect()
            })
    }
}

fn parse_group(token: &str) -> Option<RequiredGroup> {
    if let Some((id, link)) = token.split_once('|') {
        let id = id.trim();
        let link = link.trim();
        if id.parse::<i64>().is_ok() && link.starts_with("https://") {
            return Some(RequiredGroup::private(id, link));
        }
        return None;
    }

    if token.parse::<i64>().is_ok() {
        return Some(RequiredGroup::by_chat_id(token));
    }

    let name = token.strip_prefix('@')?;
    (!name.is_empty()).then(|| RequiredGroup::public(name))
}
