//! Process-wide wiring of the tracker components

use std::sync::Arc;
use tracing::info;

use crate::alerts::{AlertEvaluator, AlertStore, InMemoryAlertStore};
use crate::common::clock::{Clock, SystemClock};
use crate::common::errors::Result;
use crate::common::traits::{Notifier, PriceSource};
use crate::config::types::AppConfig;
use crate::notify::{LogNotifier, TelegramNotifier};
use crate::portfolio::PositionLedger;
use crate::prices::{CoinGeckoClient, PriceCacheSettings, PriceService};

/// Shared handles for the command layer and the scheduler
///
/// There is exactly one price service per tracker, so the ledger read path
/// and the evaluator share one cache and one upstream throttle.
pub struct Tracker {
    prices: Arc<PriceService>,
    ledger: Arc<PositionLedger>,
    alerts: Arc<dyn AlertStore>,
    evaluator: Arc<AlertEvaluator>,
}

impl Tracker {
    /// Build the production components from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let source: Arc<dyn PriceSource> = Arc::new(CoinGeckoClient::from_config(&config.price_feed)?);
        let notifier: Arc<dyn Notifier> = match &config.telegram {
            Some(telegram) => {
                info!("Delivering alerts via Telegram");
                Arc::new(TelegramNotifier::new(telegram)?)
            }
            None => {
                info!("No Telegram bot token configured, alerts will only be logged");
                Arc::new(LogNotifier)
            }
        };

        Ok(Self::with_components(
            source,
            notifier,
            Arc::new(SystemClock),
            PriceCacheSettings::from(&config.price_feed),
        ))
    }

    /// Build a tracker around arbitrary collaborators
    pub fn with_components(
        source: Arc<dyn PriceSource>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: PriceCacheSettings,
    ) -> Self {
        let prices = Arc::new(PriceService::new(source, clock.clone(), settings));
        let ledger = Arc::new(PositionLedger::new(prices.clone(), clock.clone()));
        let alerts: Arc<dyn AlertStore> = Arc::new(InMemoryAlertStore::new(clock));
        let evaluator = Arc::new(AlertEvaluator::new(alerts.clone(), prices.clone(), notifier));

        Self {
            prices,
            ledger,
            alerts,
            evaluator,
        }
    }

    pub fn prices(&self) -> &Arc<PriceService> {
        &self.prices
    }

    pub fn ledger(&self) -> &Arc<PositionLedger> {
        &self.ledger
    }

    pub fn alerts(&self) -> &Arc<dyn AlertStore> {
        &self.alerts
    }

    pub fn evaluator(&self) -> &Arc<AlertEvaluator> {
        &self.evaluator
    }
}
