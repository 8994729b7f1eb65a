//! Command definitions and mapping of Telegram updates to conversation events.

use reclaim_core::conversation::{self, CallbackAction, InboundEvent};
use teloxide::{prelude::*, types::CallbackQuery, utils::command::BotCommands};
use tracing::debug;

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "Supported commands:")]
pub enum Command {
    /// Show the main menu
    #[command(description = "Show the main menu.")]
    Start,
    /// Show usage help
    #[command(description = "How the bot works.")]
    Help,
    /// Reset one account
    #[command(description = "Send a reset link for one account.")]
    Reset,
    /// Reset a list of accounts
    #[command(description = "Send reset links for up to 50 accounts.")]
    BulkReset,
}

impl From<Command> for conversation::Command {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::Start => Self::Start,
            Command::Help => Self::Help,
            Command::Reset => Self::Reset,
            Command::BulkReset => Self::BulkReset,
        }
    }
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Event for a parsed bot command
#[must_use]
pub fn command_event(msg: &Message, cmd: Command) -> InboundEvent {
    InboundEvent::Command {
        user_id: get_user_id_safe(msg),
        chat_id: msg.chat.id.0,
        command: cmd.into(),
    }
}

/// Event for any other text message; unregistered `/commands` become
/// unknown commands, everything else free text.
#[must_use]
pub fn text_event(msg: &Message) -> Option<InboundEvent> {
    let text = msg.text()?;
    Some(InboundEvent::from_text(
        get_user_id_safe(msg),
        msg.chat.id.0,
        text,
    ))
}

/// Event for an inline button press, if its data is ours and the message is known
#[must_use]
pub fn callback_event(q: &CallbackQuery) -> Option<InboundEvent> {
    let data = q.data.as_deref()?;
    let Some(action) = CallbackAction::parse(data) else {
        debug!("Ignoring unknown callback data: {data}");
        return None;
    };
    let (chat_id, message_id) = q.message.as_ref().map(|m| (m.chat().id, m.id()))?;

    Some(InboundEvent::Callback {
        user_id: q.from.id.0.cast_signed(),
        chat_id: chat_id.0,
        message_id: message_id.0,
        action,
    })
}
