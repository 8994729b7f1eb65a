use crate::bot::handlers::{callback_event, command_event, text_event, Command};
use crate::bot::TelegramGateway;
use crate::config::BotSettings;
use reclaim_core::batch::{BatchRunner, FixedDelay};
use reclaim_core::conversation::{Conversation, InboundEvent};
use reclaim_core::gate::MembershipGate;
use reclaim_core::resolver::MultiMethodResolver;
use reclaim_core::session::InMemorySessionStore;
use reclaim_core::upstream::{default_strategies, UpstreamClient, UpstreamEndpoints};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

/// Run the Telegram transport runtime.
///
/// # Errors
///
/// Returns an error if the upstream client or the group list cannot be built.
pub async fn run_bot(settings: Arc<BotSettings>) -> anyhow::Result<()> {
    let bot = Bot::new(settings.telegram.telegram_token.clone());

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {}", e);
    }

    let conversation = build_conversation(&bot, &settings)?;
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![conversation])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn build_conversation(bot: &Bot, settings: &BotSettings) -> anyhow::Result<Arc<Conversation>> {
    let relay = settings.relay.as_ref();
    let gateway = Arc::new(TelegramGateway::new(bot.clone()));

    let endpoints = UpstreamEndpoints::from_settings(relay);
    let resolver = Arc::new(
        MultiMethodResolver::new(
            Arc::new(UpstreamClient::new(relay)?),
            default_strategies(&endpoints),
        )
        .with_concurrency(relay.concurrent_strategies),
    );
    info!(
        "Resolver initialized with {} strategies (concurrent: {}).",
        resolver.strategy_count(),
        relay.concurrent_strategies
    );

    let batch = Arc::new(BatchRunner::new(
        resolver.clone(),
        Arc::new(FixedDelay(relay.reset_delay())),
    ));

    let mut conversation = Conversation::new(
        Arc::new(InMemorySessionStore::new()),
        resolver,
        batch,
        gateway.clone(),
    );

    let groups = settings.telegram.required_groups()?;
    if groups.is_empty() {
        info!("Membership gate disabled.");
    } else {
        info!("Membership gate enabled for {} groups.", groups.len());
        conversation = conversation.with_gate(Arc::new(MembershipGate::new(groups, gateway)));
    }

    Ok(Arc::new(conversation))
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text),
                ),
        )
}

async fn dispatch(conversation: &Conversation, event: InboundEvent) {
    let user_id = event.user_id();
    if let Err(e) = conversation.dispatch(event).await {
        error!("Failed to handle update from user {}: {:#}", user_id, e);
    }
}

async fn handle_command(
    msg: Message,
    cmd: Command,
    conversation: Arc<Conversation>,
) -> Result<(), teloxide::RequestError> {
    dispatch(&conversation, command_event(&msg, cmd)).await;
    respond(())
}

async fn handle_text(
    msg: Message,
    conversation: Arc<Conversation>,
) -> Result<(), teloxide::RequestError> {
    if let Some(event) = text_event(&msg) {
        dispatch(&conversation, event).await;
    }
    respond(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    conversation: Arc<Conversation>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!("Failed to answer callback query: {}", e);
    }
    if let Some(event) = callback_event(&q) {
        dispatch(&conversation, event).await;
    }
    respond(())
}
