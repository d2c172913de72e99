//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use crypto_portfolio_alerts::common::clock::ManualClock;
use crypto_portfolio_alerts::{
    Notifier, PriceCacheSettings, PriceSource, Result, Symbol, Tracker, TrackerError, UserId,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const ALICE: UserId = 1001;
pub const BOB: UserId = 1002;

/// Fixed start time so timestamps in assertions are predictable
pub fn test_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    ))
}

/// Price source serving whatever prices the test sets, or failing on demand
#[derive(Default)]
pub struct ScriptedPriceSource {
    prices: Mutex<HashMap<Symbol, Decimal>>,
    failing: AtomicBool,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<Symbol>>>,
}

impl ScriptedPriceSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_price(&self, symbol: Symbol, price: Decimal) {
        self.prices.lock().unwrap().insert(symbol, price);
    }

    pub fn clear_price(&self, symbol: Symbol) {
        self.prices.lock().unwrap().remove(&symbol);
    }

    /// Make every following call fail with a rate-limit error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Symbols requested by each upstream call
    pub fn requests(&self) -> Vec<Vec<Symbol>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PriceSource for ScriptedPriceSource {
    async fn fetch_prices(&self, symbols: &[Symbol]) -> Result<HashMap<Symbol, Decimal>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(symbols.to_vec());

        if self.failing.load(Ordering::SeqCst) {
            return Err(TrackerError::RateLimit {
                message: "429 Too Many Requests".to_string(),
                retry_after_seconds: Some(60),
            });
        }

        let prices = self.prices.lock().unwrap();
        Ok(symbols
            .iter()
            .filter_map(|s| prices.get(s).map(|p| (*s, *p)))
            .collect())
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// Notifier that records deliveries and can be switched to fail
#[derive(Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<(UserId, String)>>,
    failing: AtomicBool,
    attempts: AtomicUsize,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn delivered(&self) -> Vec<(UserId, String)> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, user: UserId, message: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(TrackerError::NotifyFailed("chat unreachable".to_string()));
        }
        self.delivered
            .lock()
            .unwrap()
            .push((user, message.to_string()));
        Ok(())
    }
}

/// Tracker wired to scripted collaborators on a manual clock
pub struct Harness {
    pub tracker: Tracker,
    pub source: Arc<ScriptedPriceSource>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
}

pub fn harness() -> Harness {
    let source = ScriptedPriceSource::new();
    let notifier = RecordingNotifier::new();
    let clock = test_clock();
    let tracker = Tracker::with_components(
        source.clone(),
        notifier.clone(),
        clock.clone(),
        PriceCacheSettings::default(),
    );

    Harness {
        tracker,
        source,
        notifier,
        clock,
    }
}

/// Sample CoinGecko `/simple/price` response bodies
pub mod coingecko_responses {
    pub const BTC_ETH: &str = r#"{
        "bitcoin": {"usd": 67234.12},
        "ethereum": {"usd": 3456.7}
    }"#;

    pub const RATE_LIMITED: &str = r#"{
        "status": {
            "error_code": 429,
            "error_message": "You've exceeded the Rate Limit."
        }
    }"#;
}
