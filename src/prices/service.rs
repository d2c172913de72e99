//! Cached, throttled access to the upstream price source

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::cache::{PriceCache, PriceQuote};
use super::throttle::Throttle;
use crate::common::clock::Clock;
use crate::common::errors::{Result, TrackerError};
use crate::common::traits::PriceSource;
use crate::common::types::Symbol;
use crate::config::types::PriceFeedConfig;

/// Quotes resolved by one lookup. Symbols absent from the map are unavailable.
pub type PriceBatch = HashMap<Symbol, PriceQuote>;

/// Tuning knobs for `PriceService`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceCacheSettings {
    pub ttl: Duration,
    pub stale_max_age: Duration,
    pub min_call_interval: Duration,
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for PriceCacheSettings {
    fn default() -> Self {
        Self::from(&PriceFeedConfig::default())
    }
}

impl From<&PriceFeedConfig> for PriceCacheSettings {
    fn from(config: &PriceFeedConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.cache_ttl_seconds),
            stale_max_age: Duration::from_secs(config.stale_max_age_seconds),
            min_call_interval: Duration::from_millis(config.min_call_interval_ms),
            max_attempts: config.max_attempts.max(1),
            backoff_step: Duration::from_secs(config.backoff_step_seconds),
        }
    }
}

/// Price cache and fetcher
///
/// One instance is shared by the ledger read path and the alert evaluator so
/// that interactive and background lookups draw from the same cache and the
/// same upstream quota.
pub struct PriceService {
    source: Arc<dyn PriceSource>,
    clock: Arc<dyn Clock>,
    cache: PriceCache,
    throttle: Throttle,
    settings: PriceCacheSettings,
}

impl PriceService {
    pub fn new(
        source: Arc<dyn PriceSource>,
        clock: Arc<dyn Clock>,
        settings: PriceCacheSettings,
    ) -> Self {
        Self {
            source,
            clock,
            cache: PriceCache::new(settings.ttl, settings.stale_max_age),
            throttle: Throttle::new(settings.min_call_interval),
            settings,
        }
    }

    /// Get the price of one symbol
    ///
    /// Returns `Unavailable` when the upstream failed every attempt and no
    /// usable cached price exists (with `allow_stale = false`, any cached
    /// price past its TTL counts as unusable).
    pub async fn get_price(&self, symbol: Symbol, allow_stale: bool) -> Result<PriceQuote> {
        self.get_prices(&[symbol], allow_stale)
            .await?
            .remove(&symbol)
            .ok_or_else(|| TrackerError::Unavailable(symbol.to_string()))
    }

    /// Get prices for several symbols with at most one upstream call per attempt
    ///
    /// Duplicates are collapsed, fresh cache entries are served locally and
    /// all remaining symbols are fetched together.
    #[instrument(skip(self))]
    pub async fn get_prices(&self, symbols: &[Symbol], allow_stale: bool) -> Result<PriceBatch> {
        let wanted: BTreeSet<Symbol> = symbols.iter().copied().collect();
        let mut quotes = PriceBatch::with_capacity(wanted.len());
        let mut missing = Vec::new();

        let now = self.clock.now();
        for symbol in wanted {
            match self.cache.fresh(symbol, now)? {
                Some(quote) => {
                    quotes.insert(symbol, quote);
                }
                None => missing.push(symbol),
            }
        }

        if missing.is_empty() {
            return Ok(quotes);
        }

        for attempt in 1..=self.settings.max_attempts {
            self.throttle.acquire(self.clock.as_ref()).await;

            // Another caller may have refreshed these while we were queued
            let now = self.clock.now();
            let mut still_missing = Vec::with_capacity(missing.len());
            for symbol in missing {
                match self.cache.fresh(symbol, now)? {
                    Some(quote) => {
                        quotes.insert(symbol, quote);
                    }
                    None => still_missing.push(symbol),
                }
            }
            missing = still_missing;
            if missing.is_empty() {
                return Ok(quotes);
            }

            debug!(
                "Fetching {:?} from {} (attempt {}/{})",
                missing,
                self.source.source_name(),
                attempt,
                self.settings.max_attempts
            );

            match self.source.fetch_prices(&missing).await {
                Ok(prices) => {
                    let now = self.clock.now();
                    let mut unpriced = Vec::new();
                    for symbol in missing {
                        match prices.get(&symbol) {
                            Some(price) => {
                                let quote = self.cache.store(symbol, *price, now)?;
                                quotes.insert(symbol, quote);
                            }
                            None => {
                                warn!("No price for {} in upstream response", symbol);
                                unpriced.push(symbol);
                            }
                        }
                    }
                    info!("Fetched {} prices from {}", prices.len(), self.source.source_name());
                    missing = unpriced;
                    break;
                }
                Err(e) => {
                    warn!(
                        "Price fetch failed for {:?} (attempt {}/{}): {}",
                        missing, attempt, self.settings.max_attempts, e
                    );
                    if !e.is_transient() {
                        break;
                    }
                    if attempt < self.settings.max_attempts {
                        let wait = self.settings.backoff_step * attempt;
                        debug!("Retrying in {:?}", wait);
                        self.clock.sleep(wait).await;
                    }
                }
            }
        }

        let now = self.clock.now();
        for symbol in missing {
            let fallback = if allow_stale {
                self.cache.fallback(symbol, now)?
            } else {
                None
            };
            match fallback {
                Some(quote) => {
                    warn!(
                        "Using cached price for {}: {} (age {:?})",
                        symbol,
                        quote.price,
                        quote.age(now)
                    );
                    quotes.insert(symbol, quote);
                }
                None => warn!("Price for {} unavailable", symbol),
            }
        }

        Ok(quotes)
    }

    /// Drop cache entries past the staleness ceiling
    pub fn purge_expired(&self) -> Result<usize> {
        self.cache.purge_expired(self.clock.now())
    }
}
