//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::{AppConfig, PriceFeedConfig, TelegramConfig};
use crate::common::errors::{Result, TrackerError};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with APP__, e.g. APP__PRICE_FEED__API_KEY)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| TrackerError::Configuration(e.to_string()))?;

    let mut app: AppConfig = config
        .try_deserialize()
        .map_err(|e| TrackerError::Configuration(e.to_string()))?;

    // Well-known secrets also work without the APP__ prefix
    if app.price_feed.api_key.is_none() {
        app.price_feed.api_key = std::env::var("COINGECKO_API_KEY").ok();
    }
    if app.telegram.is_none() {
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            app.telegram = Some(TelegramConfig::new(token));
        }
    }

    validate(&app)?;
    Ok(app)
}

/// Load configuration from environment variables only
pub fn load_from_env() -> Result<AppConfig> {
    dotenvy::dotenv().ok();

    let mut price_feed = PriceFeedConfig {
        api_key: std::env::var("COINGECKO_API_KEY").ok(),
        ..PriceFeedConfig::default()
    };
    if let Ok(url) = std::env::var("COINGECKO_BASE_URL") {
        price_feed.base_url = url;
    }

    let telegram = std::env::var("TELEGRAM_BOT_TOKEN").ok().map(|token| {
        let mut telegram = TelegramConfig::new(token);
        if let Ok(url) = std::env::var("TELEGRAM_API_URL") {
            telegram.api_url = url;
        }
        telegram
    });

    let app = AppConfig {
        price_feed,
        telegram,
        ..AppConfig::default()
    };
    validate(&app)?;
    Ok(app)
}

fn validate(config: &AppConfig) -> Result<()> {
    let feed = &config.price_feed;
    if feed.max_attempts == 0 {
        return Err(TrackerError::Configuration(
            "price_feed.max_attempts must be at least 1".to_string(),
        ));
    }
    if feed.stale_max_age_seconds < feed.cache_ttl_seconds {
        return Err(TrackerError::Configuration(format!(
            "price_feed.stale_max_age_seconds ({}) must not be below cache_ttl_seconds ({})",
            feed.stale_max_age_seconds, feed.cache_ttl_seconds
        )));
    }
    if config.alerts.check_interval_seconds == 0 {
        return Err(TrackerError::Configuration(
            "alerts.check_interval_seconds must be positive".to_string(),
        ));
    }
    Ok(())
}
