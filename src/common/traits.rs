//! Trait definitions for the external collaborators

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

use super::errors::{Result, TrackerError};
use super::types::{Symbol, UserId};

/// Upstream price source (CoinGecko in production)
///
/// Implementations perform exactly one upstream request per call and do no
/// caching or throttling of their own; `PriceService` owns both.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch USD prices for several symbols in a single upstream call
    ///
    /// Symbols the upstream has no data for are left out of the map.
    async fn fetch_prices(&self, symbols: &[Symbol]) -> Result<HashMap<Symbol, Decimal>>;

    /// Fetch the USD price of a single symbol
    async fn fetch_price(&self, symbol: Symbol) -> Result<Decimal> {
        self.fetch_prices(&[symbol])
            .await?
            .remove(&symbol)
            .ok_or_else(|| TrackerError::InvalidResponse(format!("no price for {}", symbol)))
    }

    /// Name of the upstream, for logs
    fn source_name(&self) -> &'static str;
}

/// Delivers a message to a user
///
/// The evaluator only cares whether delivery succeeded; any error is
/// treated as `NotifyFailed`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, user: UserId, message: &str) -> Result<()>;
}
