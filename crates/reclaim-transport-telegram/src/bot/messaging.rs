//! Common messaging utilities for Telegram bot.
//!
//! Splits long replies into several messages and keeps the keyboard on the
//! last one.

use super::resilient::send_message_resilient;
use anyhow::Result;
use reclaim_core::utils::split_long_message;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ReplyMarkup};

/// Maximum message length for Telegram with safety margin.
/// Telegram's official limit is 4096, but we use 4000 to account for
/// HTML tags and other formatting that may be added.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

/// Sends a long HTML message by splitting it on line boundaries.
///
/// The optional keyboard is attached to the last part only.
///
/// # Errors
///
/// Returns an error if any part fails to send after retries.
pub async fn send_long_message(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    markup: Option<ReplyMarkup>,
) -> Result<()> {
    let parts = split_long_message(text, TELEGRAM_MESSAGE_LIMIT);
    let last = parts.len().saturating_sub(1);

    for (i, part) in parts.into_iter().enumerate() {
        let part_markup = if i == last { markup.clone() } else { None };
        send_message_resilient(bot, chat_id, part, part_markup).await?;
    }

    Ok(())
}
