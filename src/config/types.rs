//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream price feed and cache configuration
    #[serde(default)]
    pub price_feed: PriceFeedConfig,
    /// Telegram delivery (optional, deliveries are only logged without it)
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    /// Alert evaluation schedule
    #[serde(default)]
    pub alerts: AlertSettings,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

/// CoinGecko price feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceFeedConfig {
    /// Optional demo/pro API key
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL for the CoinGecko v3 API
    #[serde(default = "default_coingecko_url")]
    pub base_url: String,
    /// How long a fetched price counts as fresh
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
    /// Oldest cached price still usable as a fallback
    #[serde(default = "default_stale_max_age")]
    pub stale_max_age_seconds: u64,
    /// Minimum gap between two upstream calls, process-wide
    #[serde(default = "default_min_call_interval")]
    pub min_call_interval_ms: u64,
    /// Upstream attempts per lookup before falling back to stale data
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Linear backoff step: attempt n waits n * step before retrying
    #[serde(default = "default_backoff_step")]
    pub backoff_step_seconds: u64,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_coingecko_url(),
            cache_ttl_seconds: default_cache_ttl(),
            stale_max_age_seconds: default_stale_max_age(),
            min_call_interval_ms: default_min_call_interval(),
            max_attempts: default_max_attempts(),
            backoff_step_seconds: default_backoff_step(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl PriceFeedConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn default_coingecko_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_cache_ttl() -> u64 {
    900
}

fn default_stale_max_age() -> u64 {
    3600
}

fn default_min_call_interval() -> u64 {
    2500
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_step() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    10
}

/// Telegram Bot API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather
    pub bot_token: String,
    /// Base URL of the Bot API
    #[serde(default = "default_telegram_url")]
    pub api_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_url: default_telegram_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_telegram_url() -> String {
    "https://api.telegram.org".to_string()
}

/// Alert evaluation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSettings {
    /// Interval between evaluation passes in seconds
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval(),
        }
    }
}

impl AlertSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }
}

fn default_check_interval() -> u64 {
    900
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
