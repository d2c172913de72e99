//! Prices module - upstream client, cache, global throttle and the price service

pub mod cache;
pub mod coingecko;
pub mod messages;
pub mod service;
pub mod throttle;

pub use cache::{PriceCache, PriceCacheEntry, PriceQuote};
pub use coingecko::CoinGeckoClient;
pub use service::{PriceBatch, PriceCacheSettings, PriceService};
pub use throttle::Throttle;
