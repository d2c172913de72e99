use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::types::{Symbol, UserId};

/// Take-profit / stop-loss thresholds for one (user, symbol)
///
/// At least one threshold is always set, and when both are `take_profit`
/// is strictly above `stop_loss`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub user: UserId,
    pub symbol: Symbol,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    /// Whether `price` crosses a threshold. Take-profit wins ties.
    pub fn check(&self, price: Decimal) -> Option<Trigger> {
        if let Some(tp) = self.take_profit {
            if price >= tp {
                return Some(Trigger {
                    kind: AlertKind::TakeProfit,
                    threshold: tp,
                    price,
                });
            }
        }
        if let Some(sl) = self.stop_loss {
            if price <= sl {
                return Some(Trigger {
                    kind: AlertKind::StopLoss,
                    threshold: sl,
                    price,
                });
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    TakeProfit,
    StopLoss,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::TakeProfit => write!(f, "Take-Profit"),
            AlertKind::StopLoss => write!(f, "Stop-Loss"),
        }
    }
}

/// A threshold crossed by an observed price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub kind: AlertKind,
    pub threshold: Decimal,
    pub price: Decimal,
}

/// Counters for one evaluation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Active alerts seen at the start of the pass
    pub alerts_checked: usize,
    /// Distinct symbols a price was obtained for
    pub symbols_priced: usize,
    /// Alerts skipped because their symbol had no price
    pub deferred: usize,
    pub triggered: usize,
    pub notified: usize,
    pub notify_failures: usize,
    /// Triggered alerts another pass (or the user) removed first
    pub lost_races: usize,
}
