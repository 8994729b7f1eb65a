//! Telegram implementation of the chat gateway and membership lookup.

use super::messaging::send_long_message;
use super::resilient::{edit_message_resilient, ERROR_NOT_FOUND};
use super::views::{render_reply, DefaultRelayView};
use anyhow::Result;
use async_trait::async_trait;
use reclaim_core::conversation::{ChatGateway, Reply};
use reclaim_core::gate::{MembershipCheckError, MembershipLookup, MembershipStatus, RequiredGroup};
use teloxide::prelude::*;
use teloxide::types::{ChatMemberKind, MessageId, Recipient};
use tracing::debug;

/// Delivers conversation replies through the Bot API.
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    /// Create a gateway over a bot handle
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatGateway for TelegramGateway {
    async fn send(&self, chat_id: i64, reply: Reply) -> Result<()> {
        let rendered = render_reply::<DefaultRelayView>(&reply);
        send_long_message(&self.bot, ChatId(chat_id), &rendered.text, rendered.markup).await
    }

    async fn edit(&self, chat_id: i64, message_id: i32, reply: Reply) -> Result<()> {
        let rendered = render_reply::<DefaultRelayView>(&reply);
        let result = edit_message_resilient(
            &self.bot,
            ChatId(chat_id),
            MessageId(message_id),
            &rendered.text,
            rendered.inline_keyboard(),
        )
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains(ERROR_NOT_FOUND) => {
                debug!("Edited message is gone, sending a new one");
                send_long_message(&self.bot, ChatId(chat_id), &rendered.text, rendered.markup)
                    .await
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MembershipLookup for TelegramGateway {
    async fn membership_status(
        &self,
        group: &RequiredGroup,
        user_id: i64,
    ) -> Result<MembershipStatus, MembershipCheckError> {
        let user = u64::try_from(user_id)
            .map(UserId)
            .map_err(|_| MembershipCheckError::InvalidUser(user_id))?;

        let member = self
            .bot
            .get_chat_member(recipient(group)?, user)
            .await
            .map_err(|e| MembershipCheckError::Lookup {
                group: group.id.clone(),
                message: e.to_string(),
            })?;

        Ok(status_of(&member.kind))
    }
}

fn recipient(group: &RequiredGroup) -> Result<Recipient, MembershipCheckError> {
    if group.id.starts_with('@') {
        return Ok(Recipient::ChannelUsername(group.id.clone()));
    }
    group
        .id
        .parse::<i64>()
        .map(|id| Recipient::Id(ChatId(id)))
        .map_err(|_| MembershipCheckError::InvalidGroup(group.id.clone()))
}

fn status_of(kind: &ChatMemberKind) -> MembershipStatus {
    if kind.is_owner() {
        MembershipStatus::Creator
    } else if kind.is_administrator() {
        MembershipStatus::Admin
    } else if kind.is_present() {
        // Members and restricted users still in the chat
        MembershipStatus::Member
    } else if kind.is_banned() {
        MembershipStatus::Kicked
    } else if kind.is_left() || kind.is_restricted() {
        MembershipStatus::Left
    } else {
        MembershipStatus::Unknown
    }
}
