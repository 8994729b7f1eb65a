/// Chat gateway and membership lookup backed by the Bot API
pub mod gateway;
/// Command definitions and update-to-event mapping
pub mod handlers;
/// Common messaging utilities (split long messages, formatting)
pub mod messaging;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;
/// View layer for UI components (keyboards, messages)
pub mod views;

pub use gateway::TelegramGateway;
