//! Typed inbound events consumed by the conversation dispatcher

/// Bot command, parsed from `/name` or `/name@botname`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the main menu
    Start,
    /// Show usage help
    Help,
    /// Request a reset for one target
    Reset,
    /// Request resets for a list of targets
    BulkReset,
    /// Any other `/command`
    Unknown(String),
}

impl Command {
    /// Parse a message text; `None` when it is not a command.
    ///
    /// # Examples
    ///
    /// ```
    /// use reclaim_core::conversation::Command;
    /// assert_eq!(Command::parse("/bulk_reset@relay_bot"), Some(Command::BulkReset));
    /// assert_eq!(Command::parse("alice"), None);
    /// assert_eq!(Command::parse("/ reset"), Some(Command::Unknown(String::new())));
    /// ```
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        // A bare "/" or "/ word" is still a command, never a target
        let word = text
            .trim_start()
            .strip_prefix('/')?
            .split(char::is_whitespace)
            .next()
            .unwrap_or_default();
        let name = word.split('@').next().unwrap_or(word);
        Some(Self::from_name(name))
    }

    /// Map a bare command name (without slash) to a command
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "reset" => Self::Reset,
            "bulk_reset" | "bulkreset" => Self::BulkReset,
            _ => Self::Unknown(name.to_string()),
        }
    }

    /// Canonical name, unknown commands fall back to `start`
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start | Self::Unknown(_) => "start",
            Self::Help => "help",
            Self::Reset => "reset",
            Self::BulkReset => "bulk_reset",
        }
    }
}

const RECHECK_PREFIX: &str = "recheck:";

/// Inline-button actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Re-run the membership gate, then the originally requested command
    RecheckMembership(Command),
}

impl CallbackAction {
    /// Encode as callback data
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::RecheckMembership(command) => format!("{RECHECK_PREFIX}{}", command.name()),
        }
    }

    /// Decode callback data
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        let name = data.strip_prefix(RECHECK_PREFIX)?;
        match Command::from_name(name) {
            Command::Unknown(_) => None,
            command => Some(Self::RecheckMembership(command)),
        }
    }
}

/// Everything the chat gateway can deliver to the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A `/command`
    Command {
        /// Sender
        user_id: i64,
        /// Chat to answer in
        chat_id: i64,
        /// Parsed command
        command: Command,
    },
    /// Free text
    Text {
        /// Sender
        user_id: i64,
        /// Chat to answer in
        chat_id: i64,
        /// Raw text
        text: String,
    },
    /// Inline button press
    Callback {
        /// Presser
        user_id: i64,
        /// Chat holding the message with the button
        chat_id: i64,
        /// Message holding the button
        message_id: i32,
        /// Decoded action
        action: CallbackAction,
    },
}

impl InboundEvent {
    /// Classify a text message as a command or free text
    #[must_use]
    pub fn from_text(user_id: i64, chat_id: i64, text: &str) -> Self {
        match Command::parse(text) {
            Some(command) => Self::Command {
                user_id,
                chat_id,
                command,
            },
            None => Self::Text {
                user_id,
                chat_id,
                text: text.to_string(),
            },
        }
    }

    /// Sender of the event
    #[must_use]
    pub const fn user_id(&self) -> i64 {
        match self {
            Self::Command { user_id, .. }
            | Self::Text { user_id, .. }
            | Self::Callback { user_id, .. } => *user_id,
        }
    }
}
