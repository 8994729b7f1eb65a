mod logging;

use dotenvy::dotenv;
use logging::Redactor;
use reclaim_core::config::RelaySettings;
use reclaim_transport_telegram::config::{BotSettings, TelegramSettings};
use reclaim_transport_telegram::runner::run_bot;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Masking must be ready before the first event is written
    let redactor = Redactor::new().map_err(|e| {
        eprintln!("Failed to compile redaction patterns: {e}");
        e
    })?;
    logging::init(Arc::new(redactor));

    info!("Starting Reclaim TG Bot...");

    let settings = load_settings().map_err(|e| {
        error!("Failed to load configuration: {e}");
        e
    })?;

    run_bot(settings).await?;

    Ok(())
}

fn load_settings() -> Result<Arc<BotSettings>, config::ConfigError> {
    let relay = RelaySettings::new()?;
    let telegram = TelegramSettings::new()?;

    info!(
        "Configuration loaded (reset delay: {} ms, upstream timeout: {} s).",
        relay.reset_delay_ms, relay.upstream_timeout_secs
    );
    Ok(Arc::new(BotSettings::new(relay, telegram)))
}
