//! Crypto Portfolio Alerts Library
//!
//! Per-user crypto position ledger with average-cost accounting, realized
//! and unrealized P&L, and take-profit / stop-loss alerts evaluated against
//! a cached, rate-limited CoinGecko price feed.

pub mod alerts;
pub mod app;
pub mod common;
pub mod config;
pub mod notify;
pub mod portfolio;
pub mod prices;

// Re-export commonly used types
pub use alerts::{Alert, AlertEvaluator, AlertKind, AlertStore, EvaluationReport, InMemoryAlertStore};
pub use app::Tracker;
pub use common::clock::{Clock, SystemClock};
pub use common::errors::{Result, TrackerError};
pub use common::traits::{Notifier, PriceSource};
pub use common::types::{parse_price, parse_quantity, Action, Symbol, UserId};
pub use config::types::AppConfig;
pub use notify::{LogNotifier, TelegramNotifier};
pub use portfolio::{
    PortfolioSummary, Position, PositionLedger, PositionView, RealizedPnlRecord, Transaction,
};
pub use prices::{CoinGeckoClient, PriceCacheSettings, PriceQuote, PriceService};
