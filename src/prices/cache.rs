//! Time-boxed price cache with a stale fallback window

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::common::clock::age;
use crate::common::errors::{Result, TrackerError};
use crate::common::types::Symbol;

/// Last price fetched for a symbol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceCacheEntry {
    pub symbol: Symbol,
    pub price: Decimal,
    pub fetched_at: DateTime<Utc>,
}

/// A price handed to callers, flagged when it came from the stale window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: Symbol,
    pub price: Decimal,
    pub fetched_at: DateTime<Utc>,
    pub stale: bool,
}

impl PriceQuote {
    /// How old the underlying price is at `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        age(now, self.fetched_at)
    }
}

impl PriceCacheEntry {
    fn quote(&self, stale: bool) -> PriceQuote {
        PriceQuote {
            symbol: self.symbol,
            price: self.price,
            fetched_at: self.fetched_at,
            stale,
        }
    }
}

/// Process-wide cache keyed by symbol
///
/// Entries younger than `ttl` are fresh. Older entries stay usable as a
/// fallback until `stale_max_age`, after which they count as missing.
#[derive(Debug)]
pub struct PriceCache {
    entries: Mutex<HashMap<Symbol, PriceCacheEntry>>,
    ttl: Duration,
    stale_max_age: Duration,
}

impl PriceCache {
    pub fn new(ttl: Duration, stale_max_age: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            stale_max_age,
        }
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<Symbol, PriceCacheEntry>>> {
        self.entries
            .lock()
            .map_err(|_| TrackerError::Internal("price cache lock poisoned".to_string()))
    }

    /// Fresh quote, if one exists
    pub fn fresh(&self, symbol: Symbol, now: DateTime<Utc>) -> Result<Option<PriceQuote>> {
        let entries = self.entries()?;
        Ok(entries
            .get(&symbol)
            .filter(|entry| age(now, entry.fetched_at) < self.ttl)
            .map(|entry| {
                debug!("Cache hit for {}: {}", symbol, entry.price);
                entry.quote(false)
            }))
    }

    /// Last known quote regardless of TTL, as long as it is inside the
    /// staleness ceiling
    pub fn fallback(&self, symbol: Symbol, now: DateTime<Utc>) -> Result<Option<PriceQuote>> {
        let entries = self.entries()?;
        Ok(entries
            .get(&symbol)
            .filter(|entry| age(now, entry.fetched_at) < self.stale_max_age)
            .map(|entry| entry.quote(age(now, entry.fetched_at) >= self.ttl)))
    }

    /// Record a freshly fetched price
    pub fn store(&self, symbol: Symbol, price: Decimal, now: DateTime<Utc>) -> Result<PriceQuote> {
        let entry = PriceCacheEntry {
            symbol,
            price,
            fetched_at: now,
        };
        self.entries()?.insert(symbol, entry);
        Ok(entry.quote(false))
    }

    /// Drop entries past the staleness ceiling. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|_, entry| age(now, entry.fetched_at) < self.stale_max_age);
        Ok(before - entries.len())
    }

    /// Raw entry, for inspection
    pub fn entry(&self, symbol: Symbol) -> Result<Option<PriceCacheEntry>> {
        Ok(self.entries()?.get(&symbol).copied())
    }

    pub fn len(&self) -> usize {
        self.entries().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
