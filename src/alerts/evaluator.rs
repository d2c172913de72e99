//! Periodic take-profit / stop-loss evaluation

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use super::message::trigger_message;
use super::store::AlertStore;
use super::types::EvaluationReport;
use crate::common::errors::Result;
use crate::common::traits::Notifier;
use crate::common::types::Symbol;
use crate::prices::PriceService;

/// Checks every active alert against current prices and notifies owners
///
/// Delivery is at most once per alert. A triggered alert is claimed in the
/// store before notifying, and only the claim holder sends the notification,
/// so overlapping passes cannot both fire it. The alert stays stored during
/// delivery: it is deleted once delivery succeeds and released for the next
/// pass when delivery fails.
pub struct AlertEvaluator {
    store: Arc<dyn AlertStore>,
    prices: Arc<PriceService>,
    notifier: Arc<dyn Notifier>,
}

impl AlertEvaluator {
    pub fn new(
        store: Arc<dyn AlertStore>,
        prices: Arc<PriceService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            prices,
            notifier,
        }
    }

    /// Run a single evaluation pass
    #[instrument(skip(self))]
    pub async fn run_pass(&self) -> Result<EvaluationReport> {
        let alerts = self.store.list_all_active()?;
        let mut report = EvaluationReport {
            alerts_checked: alerts.len(),
            ..Default::default()
        };

        if alerts.is_empty() {
            debug!("No active alerts");
            return Ok(report);
        }

        let symbols: Vec<Symbol> = alerts
            .iter()
            .map(|a| a.symbol)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let quotes = self.prices.get_prices(&symbols, true).await?;
        report.symbols_priced = quotes.len();

        for alert in alerts {
            let Some(quote) = quotes.get(&alert.symbol) else {
                debug!(
                    "Deferring {} alert for user {}: no price",
                    alert.symbol, alert.user
                );
                report.deferred += 1;
                continue;
            };
            if alert.check(quote.price).is_none() {
                continue;
            }

            let Some(claim) = self.store.claim_alert(alert.user, alert.symbol)? else {
                debug!(
                    "{} alert for user {} already handled elsewhere",
                    alert.symbol, alert.user
                );
                report.lost_races += 1;
                continue;
            };

            // The user may have moved the thresholds since the listing
            let Some(trigger) = claim.alert.check(quote.price) else {
                self.store.release_claim(&claim)?;
                continue;
            };
            report.triggered += 1;

            let claimed = &claim.alert;
            let message = trigger_message(claimed, &trigger, quote);
            match self.notifier.deliver(claimed.user, &message).await {
                Ok(()) => {
                    info!(
                        "{} fired for user {} on {} at {}",
                        trigger.kind, claimed.user, claimed.symbol, trigger.price
                    );
                    report.notified += 1;
                    if !self.store.complete_claim(&claim)? {
                        debug!(
                            "{} alert for user {} changed during delivery, keeping the new version",
                            claimed.symbol, claimed.user
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        "Notification to user {} failed, keeping {} alert: {}",
                        claimed.user, claimed.symbol, e
                    );
                    report.notify_failures += 1;
                    self.store.release_claim(&claim)?;
                }
            }
        }

        match self.prices.purge_expired() {
            Ok(0) => {}
            Ok(purged) => debug!("Purged {} expired prices", purged),
            Err(e) => warn!("Price cache purge failed: {}", e),
        }

        info!(
            "Alert pass: {} checked, {} deferred, {} triggered, {} notified, {} failed",
            report.alerts_checked,
            report.deferred,
            report.triggered,
            report.notified,
            report.notify_failures
        );
        Ok(report)
    }

    /// Run passes forever at a fixed cadence
    ///
    /// A pass that overruns delays the next tick instead of bunching up the
    /// missed ones.
    pub async fn run_periodic(&self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.run_pass().await {
                error!("Alert pass failed: {}", e);
            }
        }
    }
}
