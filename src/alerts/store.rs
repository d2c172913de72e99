//! Alert storage

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use super::types::Alert;
use crate::common::clock::{age, Clock};
use crate::common::errors::{Result, TrackerError};
use crate::common::types::{Symbol, UserId};

/// How long an unfinished claim blocks other evaluators
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(5 * 60);

/// Exclusive right to notify about one alert
///
/// The alert stays stored (and visible to its owner) while a claim is held.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertClaim {
    /// Alert as stored when the claim was taken
    pub alert: Alert,
    pub token: u64,
}

/// Alert table keyed by (user, symbol)
///
/// The evaluator never deletes an alert before it has notified: it takes a
/// claim, delivers, then either completes the claim (compare-and-delete) or
/// releases it. User removals and edits in the meantime cancel the claim.
pub trait AlertStore: Send + Sync {
    /// Create or update thresholds
    ///
    /// A `None` threshold keeps the stored value; passing `None` for both is
    /// rejected. The merged result must satisfy `take_profit > stop_loss`.
    fn set_alert(
        &self,
        user: UserId,
        symbol: Symbol,
        take_profit: Option<Decimal>,
        stop_loss: Option<Decimal>,
    ) -> Result<Alert>;

    /// Delete and return the alert, `NotFound` if it is already gone
    fn remove_alert(&self, user: UserId, symbol: Symbol) -> Result<Alert>;

    fn get_alert(&self, user: UserId, symbol: Symbol) -> Result<Option<Alert>>;

    /// A user's alerts ordered by symbol
    fn list_alerts(&self, user: UserId) -> Result<Vec<Alert>>;

    fn list_all_active(&self) -> Result<Vec<Alert>>;

    /// Mark the alert as being notified
    ///
    /// `None` when the alert is gone or another live claim holds it.
    fn claim_alert(&self, user: UserId, symbol: Symbol) -> Result<Option<AlertClaim>>;

    /// Delete the alert if the claim is still current. Returns whether it
    /// was deleted.
    fn complete_claim(&self, claim: &AlertClaim) -> Result<bool>;

    /// Drop the claim and leave the alert active
    fn release_claim(&self, claim: &AlertClaim) -> Result<bool>;
}

#[derive(Debug)]
struct StoredAlert {
    alert: Alert,
    claim: Option<(u64, DateTime<Utc>)>,
}

#[derive(Debug, Default)]
struct AlertTable {
    alerts: HashMap<(UserId, Symbol), StoredAlert>,
    next_token: u64,
}

impl AlertTable {
    /// Stored alert still held by `claim`
    fn claimed(&mut self, claim: &AlertClaim) -> Option<&mut StoredAlert> {
        self.alerts
            .get_mut(&(claim.alert.user, claim.alert.symbol))
            .filter(|stored| matches!(stored.claim, Some((token, _)) if token == claim.token))
    }
}

/// Process-wide in-memory alert table
pub struct InMemoryAlertStore {
    table: Mutex<AlertTable>,
    clock: Arc<dyn Clock>,
    claim_lease: Duration,
}

impl InMemoryAlertStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_claim_lease(clock, DEFAULT_CLAIM_LEASE)
    }

    /// Claims older than `claim_lease` (an evaluator that died mid-delivery)
    /// can be taken over by the next pass.
    pub fn with_claim_lease(clock: Arc<dyn Clock>, claim_lease: Duration) -> Self {
        Self {
            table: Mutex::new(AlertTable::default()),
            clock,
            claim_lease,
        }
    }

    fn table(&self) -> Result<MutexGuard<'_, AlertTable>> {
        self.table
            .lock()
            .map_err(|_| TrackerError::Internal("alert store lock poisoned".to_string()))
    }
}

impl AlertStore for InMemoryAlertStore {
    fn set_alert(
        &self,
        user: UserId,
        symbol: Symbol,
        take_profit: Option<Decimal>,
        stop_loss: Option<Decimal>,
    ) -> Result<Alert> {
        if take_profit.is_none() && stop_loss.is_none() {
            return Err(TrackerError::InvalidInput(
                "set a take-profit, a stop-loss, or both".to_string(),
            ));
        }
        for (name, value) in [("take-profit", take_profit), ("stop-loss", stop_loss)] {
            if let Some(value) = value {
                if value <= Decimal::ZERO {
                    return Err(TrackerError::InvalidInput(format!(
                        "{} must be positive, got {}",
                        name, value
                    )));
                }
            }
        }

        let now = self.clock.now();
        let mut table = self.table()?;
        let existing = table.alerts.get(&(user, symbol)).map(|stored| &stored.alert);

        let merged_tp = take_profit.or_else(|| existing.and_then(|a| a.take_profit));
        let merged_sl = stop_loss.or_else(|| existing.and_then(|a| a.stop_loss));
        if let (Some(tp), Some(sl)) = (merged_tp, merged_sl) {
            if tp <= sl {
                return Err(TrackerError::InvalidThresholds {
                    take_profit: tp,
                    stop_loss: sl,
                });
            }
        }

        let alert = Alert {
            user,
            symbol,
            take_profit: merged_tp,
            stop_loss: merged_sl,
            created_at: existing.map(|a| a.created_at).unwrap_or(now),
            updated_at: now,
        };
        // An edit invalidates any in-flight claim on the old thresholds
        table.alerts.insert(
            (user, symbol),
            StoredAlert {
                alert: alert.clone(),
                claim: None,
            },
        );

        info!(
            "Alert set for user {} on {}: tp={:?} sl={:?}",
            user, symbol, alert.take_profit, alert.stop_loss
        );
        Ok(alert)
    }

    fn remove_alert(&self, user: UserId, symbol: Symbol) -> Result<Alert> {
        self.table()?
            .alerts
            .remove(&(user, symbol))
            .map(|stored| stored.alert)
            .ok_or_else(|| TrackerError::NotFound(format!("no {} alert for user {}", symbol, user)))
    }

    fn get_alert(&self, user: UserId, symbol: Symbol) -> Result<Option<Alert>> {
        Ok(self
            .table()?
            .alerts
            .get(&(user, symbol))
            .map(|stored| stored.alert.clone()))
    }

    fn list_alerts(&self, user: UserId) -> Result<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .table()?
            .alerts
            .values()
            .filter(|stored| stored.alert.user == user)
            .map(|stored| stored.alert.clone())
            .collect();
        alerts.sort_by_key(|a| a.symbol);
        Ok(alerts)
    }

    fn list_all_active(&self) -> Result<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .table()?
            .alerts
            .values()
            .map(|stored| stored.alert.clone())
            .collect();
        alerts.sort_by_key(|a| (a.symbol, a.user));
        Ok(alerts)
    }

    fn claim_alert(&self, user: UserId, symbol: Symbol) -> Result<Option<AlertClaim>> {
        let now = self.clock.now();
        let mut table = self.table()?;
        let token = table.next_token + 1;

        let Some(stored) = table.alerts.get_mut(&(user, symbol)) else {
            return Ok(None);
        };
        if let Some((held, claimed_at)) = stored.claim {
            if age(now, claimed_at) < self.claim_lease {
                return Ok(None);
            }
            debug!(
                "Taking over expired claim {} on {} alert for user {}",
                held, symbol, user
            );
        }
        stored.claim = Some((token, now));
        let alert = stored.alert.clone();
        table.next_token = token;

        Ok(Some(AlertClaim { alert, token }))
    }

    fn complete_claim(&self, claim: &AlertClaim) -> Result<bool> {
        let mut table = self.table()?;
        if table.claimed(claim).is_none() {
            return Ok(false);
        }
        table
            .alerts
            .remove(&(claim.alert.user, claim.alert.symbol));
        Ok(true)
    }

    fn release_claim(&self, claim: &AlertClaim) -> Result<bool> {
        let mut table = self.table()?;
        Ok(match table.claimed(claim) {
            Some(stored) => {
                stored.claim = None;
                true
            }
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::clock::ManualClock;
    use rust_decimal_macros::dec;

    fn store() -> InMemoryAlertStore {
        InMemoryAlertStore::new(Arc::new(ManualClock::default()))
    }

    #[test]
    fn test_upsert_preserves_other_threshold() {
        let store = store();
        store.set_alert(1, Symbol::Btc, Some(dec!(80000)), None).unwrap();
        let alert = store.set_alert(1, Symbol::Btc, None, Some(dec!(40000))).unwrap();

        assert_eq!(alert.take_profit, Some(dec!(80000)));
        assert_eq!(alert.stop_loss, Some(dec!(40000)));
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let store = store();
        let err = store
            .set_alert(1, Symbol::Btc, Some(dec!(70000)), Some(dec!(80000)))
            .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidThresholds { .. }));

        // Equal thresholds are just as ambiguous
        store.set_alert(1, Symbol::Eth, None, Some(dec!(3000))).unwrap();
        let err = store.set_alert(1, Symbol::Eth, Some(dec!(3000)), None).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidThresholds { .. }));
        assert_eq!(
            store.get_alert(1, Symbol::Eth).unwrap().unwrap().take_profit,
            None
        );
    }

    #[test]
    fn test_rejects_empty_and_non_positive() {
        let store = store();
        assert!(matches!(
            store.set_alert(1, Symbol::Btc, None, None),
            Err(TrackerError::InvalidInput(_))
        ));
        assert!(matches!(
            store.set_alert(1, Symbol::Btc, Some(dec!(0)), None),
            Err(TrackerError::InvalidInput(_))
        ));
        assert!(store.list_alerts(1).unwrap().is_empty());
    }

    #[test]
    fn test_remove_twice() {
        let store = store();
        store.set_alert(1, Symbol::Sol, Some(dec!(200)), None).unwrap();

        assert!(store.remove_alert(1, Symbol::Sol).is_ok());
        assert!(matches!(
            store.remove_alert(1, Symbol::Sol),
            Err(TrackerError::NotFound(_))
        ));
    }

    #[test]
    fn test_claim_is_exclusive_and_keeps_alert() {
        let store = store();
        store.set_alert(1, Symbol::Btc, Some(dec!(80000)), None).unwrap();

        let claim = store.claim_alert(1, Symbol::Btc).unwrap().unwrap();

        assert!(store.claim_alert(1, Symbol::Btc).unwrap().is_none());
        assert!(store.get_alert(1, Symbol::Btc).unwrap().is_some());
        assert!(store.complete_claim(&claim).unwrap());
        assert!(store.get_alert(1, Symbol::Btc).unwrap().is_none());
        assert!(store.claim_alert(1, Symbol::Btc).unwrap().is_none());
    }

    #[test]
    fn test_released_claim_can_be_retaken() {
        let store = store();
        store.set_alert(1, Symbol::Eth, None, Some(dec!(2000))).unwrap();
        let first = store.claim_alert(1, Symbol::Eth).unwrap().unwrap();

        assert!(store.release_claim(&first).unwrap());
        let second = store.claim_alert(1, Symbol::Eth).unwrap().unwrap();

        assert_ne!(first.token, second.token);
        // The stale claim can no longer delete the alert
        assert!(!store.complete_claim(&first).unwrap());
        assert!(store.get_alert(1, Symbol::Eth).unwrap().is_some());
    }

    #[test]
    fn test_user_edit_cancels_claim() {
        let store = store();
        store
            .set_alert(1, Symbol::Btc, Some(dec!(80000)), Some(dec!(40000)))
            .unwrap();
        let claim = store.claim_alert(1, Symbol::Btc).unwrap().unwrap();

        let edited = store.set_alert(1, Symbol::Btc, Some(dec!(90000)), None).unwrap();

        assert_eq!(edited.stop_loss, Some(dec!(40000)));
        assert!(!store.complete_claim(&claim).unwrap());
        assert_eq!(store.get_alert(1, Symbol::Btc).unwrap(), Some(edited));
    }

    #[test]
    fn test_user_removal_during_claim_wins() {
        let store = store();
        store.set_alert(1, Symbol::Sol, Some(dec!(200)), None).unwrap();
        let claim = store.claim_alert(1, Symbol::Sol).unwrap().unwrap();

        assert!(store.remove_alert(1, Symbol::Sol).is_ok());

        assert!(!store.release_claim(&claim).unwrap());
        assert!(store.get_alert(1, Symbol::Sol).unwrap().is_none());
    }

    #[test]
    fn test_expired_claim_is_taken_over() {
        let clock = Arc::new(ManualClock::default());
        let store = InMemoryAlertStore::new(clock.clone());
        store.set_alert(1, Symbol::Dot, Some(dec!(10)), None).unwrap();
        let abandoned = store.claim_alert(1, Symbol::Dot).unwrap().unwrap();

        clock.advance(DEFAULT_CLAIM_LEASE);
        let fresh = store.claim_alert(1, Symbol::Dot).unwrap().unwrap();

        assert!(!store.complete_claim(&abandoned).unwrap());
        assert!(store.complete_claim(&fresh).unwrap());
    }

    #[test]
    fn test_list_scoped_to_user() {
        let store = store();
        store.set_alert(1, Symbol::Eth, Some(dec!(5000)), None).unwrap();
        store.set_alert(1, Symbol::Btc, Some(dec!(90000)), None).unwrap();
        store.set_alert(2, Symbol::Btc, None, Some(dec!(30000))).unwrap();

        let symbols: Vec<Symbol> = store.list_alerts(1).unwrap().iter().map(|a| a.symbol).collect();
        assert_eq!(symbols, vec![Symbol::Btc, Symbol::Eth]);
        assert_eq!(store.list_all_active().unwrap().len(), 3);
    }
}
