//! REST client for the CoinGecko simple price endpoint

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use super::messages::{number_to_decimal, ErrorResponse, SimplePriceResponse};
use crate::common::errors::{Result, TrackerError};
use crate::common::traits::PriceSource;
use crate::common::types::Symbol;
use crate::config::types::PriceFeedConfig;

const API_KEY_HEADER: &str = "x-cg-demo-api-key";
const USER_AGENT: &str = concat!("crypto-portfolio-alerts/", env!("CARGO_PKG_VERSION"));

/// REST client for CoinGecko
///
/// Performs a single request per call. Caching, throttling and retries live
/// in `PriceService`.
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    /// HTTP client
    client: Client,
    /// Base URL for the v3 API
    base_url: Url,
    /// Optional demo API key
    api_key: Option<String>,
}

impl CoinGeckoClient {
    /// Create a new client (no API key)
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    /// Create a new client with custom timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TrackerError::Internal(e.to_string()))?;

        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| TrackerError::Configuration(format!("invalid price feed URL: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: None,
        })
    }

    /// Build a client from configuration
    pub fn from_config(config: &PriceFeedConfig) -> Result<Self> {
        let client = Self::with_timeout(&config.base_url, config.request_timeout())?;
        Ok(match &config.api_key {
            Some(key) => client.with_api_key(key.clone()),
            None => client,
        })
    }

    /// Set the API key sent with every request
    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    fn simple_price_url(&self, symbols: &[Symbol]) -> Result<Url> {
        let ids: Vec<&str> = symbols.iter().map(|s| s.coingecko_id()).collect();
        let mut url = self
            .base_url
            .join("simple/price")
            .map_err(|e| TrackerError::Internal(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("ids", &ids.join(","))
            .append_pair("vs_currencies", "usd");
        Ok(url)
    }

    /// Fetch USD prices for the given symbols
    #[instrument(skip(self))]
    pub async fn get_simple_prices(&self, symbols: &[Symbol]) -> Result<HashMap<Symbol, Decimal>> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let url = self.simple_price_url(symbols)?;
        debug!("Fetching prices from: {}", url);

        let mut request = self.client.get(url).header("Accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_seconds = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.message())
                .unwrap_or_else(|| status.to_string());
            return Err(TrackerError::RateLimit {
                message,
                retry_after_seconds,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackerError::InvalidResponse(format!(
                "CoinGecko returned status {}: {}",
                status, body
            )));
        }

        let body: SimplePriceResponse = response.json().await?;
        let mut prices = HashMap::with_capacity(symbols.len());

        for (coin_id, quotes) in &body {
            let Some(symbol) = Symbol::from_coingecko_id(coin_id) else {
                debug!("Ignoring unrequested coin {}", coin_id);
                continue;
            };
            match quotes.get("usd").and_then(number_to_decimal) {
                Some(price) => {
                    prices.insert(symbol, price);
                }
                None => warn!("Unparseable USD price for {}", coin_id),
            }
        }

        Ok(prices)
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn fetch_prices(&self, symbols: &[Symbol]) -> Result<HashMap<Symbol, Decimal>> {
        self.get_simple_prices(symbols).await
    }

    fn source_name(&self) -> &'static str {
        "CoinGecko"
    }
}
