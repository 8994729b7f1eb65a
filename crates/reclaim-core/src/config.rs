//! Configuration and settings management
//!
//! Loads relay settings from config files and environment variables and
//! defines the constants shared by the core and transport crates.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard cap on the number of targets accepted in one bulk request.
pub const MAX_BULK_TARGETS: usize = 50;

/// Default pause between two consecutive bulk targets.
pub const DEFAULT_RESET_DELAY_MS: u64 = 2000;
/// Default timeout for a single upstream HTTP call.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 20;
/// Public web host of the recovery service.
pub const DEFAULT_UPSTREAM_WEB_BASE: &str = "https://www.instagram.com";
/// Public mobile API host of the recovery service.
pub const DEFAULT_UPSTREAM_MOBILE_BASE: &str = "https://i.instagram.com";

// Chat API retry configuration
/// Maximum retry attempts for chat API operations
pub const CHAT_API_MAX_RETRIES: usize = 3;
/// Initial backoff for chat API retries
pub const CHAT_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound for a single chat API backoff step
pub const CHAT_API_MAX_BACKOFF_MS: u64 = 4000;

/// Build the layered configuration shared by every settings struct.
///
/// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `APP__*` prefixed environment, plain environment.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be read.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Environment::default() maps UPPER_SNAKE_CASE to snake_case keys
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Relay settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelaySettings {
    /// Pause between consecutive bulk targets, in milliseconds
    #[serde(default = "default_reset_delay_ms")]
    pub reset_delay_ms: u64,
    /// Timeout of one upstream HTTP call, in seconds
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
    /// Base URL of the upstream web endpoints
    #[serde(default = "default_upstream_web_base")]
    pub upstream_web_base: String,
    /// Base URL of the upstream mobile API endpoints
    #[serde(default = "default_upstream_mobile_base")]
    pub upstream_mobile_base: String,
    /// Run the strategies for one target concurrently
    #[serde(default = "default_concurrent_strategies")]
    pub concurrent_strategies: bool,
}

const fn default_reset_delay_ms() -> u64 {
    DEFAULT_RESET_DELAY_MS
}

const fn default_upstream_timeout_secs() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_SECS
}

fn default_upstream_web_base() -> String {
    DEFAULT_UPSTREAM_WEB_BASE.to_string()
}

fn default_upstream_mobile_base() -> String {
    DEFAULT_UPSTREAM_MOBILE_BASE.to_string()
}

const fn default_concurrent_strategies() -> bool {
    true
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            reset_delay_ms: DEFAULT_RESET_DELAY_MS,
            upstream_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            upstream_web_base: default_upstream_web_base(),
            upstream_mobile_base: default_upstream_mobile_base(),
            concurrent_strategies: true,
        }
    }
}

impl RelaySettings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reclaim_core::config::RelaySettings;
    ///
    /// let settings = RelaySettings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading or deserialization fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Pause applied between two consecutive bulk targets
    #[must_use]
    pub const fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    /// Timeout applied to each upstream HTTP call
    #[must_use]
    pub const fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}
