//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! Wraps sends and edits in [`reclaim_core::utils::retry_chat_operation`] so
//! transient network failures are retried with exponential backoff and jitter.

use anyhow::Result;
use super::messaging::TELEGRAM_MESSAGE_LIMIT;
use reclaim_core::utils::{retry_chat_operation, split_long_message};
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, Message, MessageId, ParseMode, ReplyMarkup};
use tracing::debug;

/// Bot API error text for edits that would not change anything
pub const ERROR_NOT_MODIFIED: &str = "message is not modified";
/// Bot API error text for edits of deleted messages
pub const ERROR_NOT_FOUND: &str = "message to edit not found";

/// Send an HTML message with automatic retry on network failures.
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
///
/// # Examples
///
/// ```ignore
/// let msg = send_message_resilient(&bot, chat_id, "⏳ Processing...", None).await?;
/// ```
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    markup: Option<ReplyMarkup>,
) -> Result<Message> {
    let text = text.into();
    retry_chat_operation(|| async {
        let mut req = bot
            .send_message(chat_id, text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup.clone() {
            req = req.reply_markup(markup);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit an HTML message with automatic retry on network failures.
///
/// Text longer than the platform limit is cut to its first well-formed part.
/// An edit that would not
/// change the message counts as success and yields `None`.
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn edit_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<Option<Message>> {
    let text = fit_edit_text(text);

    retry_chat_operation(|| async {
        let mut req = bot
            .edit_message_text(chat_id, msg_id, text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard.clone() {
            req = req.reply_markup(keyboard);
        }
        match req.await {
            Ok(msg) => Ok(Some(msg)),
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains(ERROR_NOT_MODIFIED) {
                    debug!("Message update skipped: {ERROR_NOT_MODIFIED}");
                    return Ok(None);
                }
                Err(anyhow::anyhow!("Telegram edit error: {e}"))
            }
        }
    })
    .await
}

fn fit_edit_text(text: &str) -> String {
    let mut parts = split_long_message(text, TELEGRAM_MESSAGE_LIMIT);
    if parts.len() > 1 {
        format!("{}...\n\n<i>(message truncated)</i>", parts.swap_remove(0))
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_edit_is_unchanged() {
        let text = "⏳ Processing 1/2: <code>bob</code>";
        assert_eq!(fit_edit_text(text), text);
    }

    #[test]
    fn test_long_edit_keeps_markup_balanced() {
        let text = format!("⏳ Processing 1/1: <code>{}</code>", "x&amp;".repeat(1200));
        let fitted = fit_edit_text(&text);

        assert!(fitted.ends_with("<i>(message truncated)</i>"));
        assert!(fitted.chars().count() < 4096);
        assert_eq!(fitted.matches("<code>").count(), fitted.matches("</code>").count());
        assert_eq!(fitted.matches('&').count(), fitted.matches("&amp;").count());
    }
}
