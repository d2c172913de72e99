use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::errors::{Result, TrackerError};
use crate::common::types::{Action, Symbol};
use crate::prices::PriceQuote;

/// Open holding of one symbol for one user
///
/// A position with zero quantity never exists; it is deleted instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: Decimal,
    /// Cost basis per unit
    pub avg_price: Decimal,
    /// Total cost basis of the held quantity (`quantity * avg_price`, kept
    /// exact for buy-only histories)
    pub cost_basis: Decimal,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    pub fn open(symbol: Symbol, quantity: Decimal, price: Decimal, now: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            symbol,
            quantity,
            avg_price: price,
            cost_basis: checked(quantity.checked_mul(price), "cost basis")?,
            opened_at: now,
            updated_at: now,
        })
    }

    /// Position after buying `quantity` more at `price`
    ///
    /// The new cost basis is the running sum of quantity * price, so any
    /// ordering of the same buys lands on the same average.
    pub fn with_buy(&self, quantity: Decimal, price: Decimal, now: DateTime<Utc>) -> Result<Self> {
        let added_cost = checked(quantity.checked_mul(price), "cost basis")?;
        let cost_basis = checked(self.cost_basis.checked_add(added_cost), "cost basis")?;
        let new_quantity = checked(self.quantity.checked_add(quantity), "quantity")?;
        let avg_price = checked(cost_basis.checked_div(new_quantity), "average price")?;

        Ok(Self {
            symbol: self.symbol,
            quantity: new_quantity,
            avg_price,
            cost_basis,
            opened_at: self.opened_at,
            updated_at: now,
        })
    }

    /// Position after disposing of `quantity` units, or `None` when nothing
    /// is left. The per-unit cost basis is left untouched.
    pub fn with_reduction(&self, quantity: Decimal, now: DateTime<Utc>) -> Result<Option<Self>> {
        if quantity > self.quantity {
            return Err(TrackerError::InsufficientQuantity {
                symbol: self.symbol.to_string(),
                requested: quantity,
                available: self.quantity,
            });
        }

        let remaining = self.quantity - quantity;
        if remaining.is_zero() {
            return Ok(None);
        }

        Ok(Some(Self {
            symbol: self.symbol,
            quantity: remaining,
            avg_price: self.avg_price,
            cost_basis: checked(remaining.checked_mul(self.avg_price), "cost basis")?,
            opened_at: self.opened_at,
            updated_at: now,
        }))
    }
}

pub(crate) fn checked(value: Option<Decimal>, what: &str) -> Result<Decimal> {
    value.ok_or_else(|| TrackerError::InvalidInput(format!("{} out of range", what)))
}

pub(crate) fn checked_sum(values: impl IntoIterator<Item = Decimal>, what: &str) -> Result<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |total, value| checked(total.checked_add(value), what))
}

/// Immutable record of a ledger mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sequential per user, starting at 1
    pub id: u64,
    pub action: Action,
    pub symbol: Symbol,
    pub quantity: Decimal,
    /// Buy price, sell price, or the average cost for removals
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Only present on sells
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<Decimal>,
    /// Cost basis per unit at the time of a sell
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_cost_at_sale: Option<Decimal>,
}

/// Profit or loss locked in by a sell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedPnlRecord {
    pub symbol: Symbol,
    pub quantity_sold: Decimal,
    pub sell_price: Decimal,
    pub avg_cost_at_sale: Decimal,
    /// `(sell_price - avg_cost_at_sale) * quantity_sold`
    pub pnl: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of `PositionLedger::add`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyOutcome {
    /// True when the buy opened a new position
    pub created: bool,
    pub position: Position,
}

/// Outcome of `PositionLedger::sell`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellOutcome {
    pub record: RealizedPnlRecord,
    /// Remaining position, `None` when fully closed
    pub remaining: Option<Position>,
}

/// Outcome of `PositionLedger::remove`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveOutcome {
    pub symbol: Symbol,
    pub quantity_removed: Decimal,
    /// Remaining position, `None` after a full removal
    pub remaining: Option<Position>,
}

/// Position joined with its current price for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionView {
    pub position: Position,
    /// `None` when no price data exists at all
    pub quote: Option<PriceQuote>,
    pub invested: Decimal,
    /// `None` without a price, or when the value is out of `Decimal` range
    pub current_value: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    /// `None` when the price is unknown or the average cost is zero
    pub unrealized_pnl_percent: Option<Decimal>,
}

impl PositionView {
    pub fn new(position: Position, quote: Option<PriceQuote>) -> Self {
        let invested = position.cost_basis;
        let current_value = quote.and_then(|q| position.quantity.checked_mul(q.price));
        let unrealized_pnl = current_value.and_then(|value| value.checked_sub(invested));
        let unrealized_pnl_percent = match (quote, unrealized_pnl) {
            (Some(q), Some(_)) => percent_change(position.avg_price, q.price),
            _ => None,
        };

        Self {
            position,
            quote,
            invested,
            current_value,
            unrealized_pnl,
            unrealized_pnl_percent,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.quote.map(|q| q.stale).unwrap_or(false)
    }
}

/// Open position ranked by unrealized return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performer {
    pub symbol: Symbol,
    pub pnl_percent: Decimal,
}

/// Portfolio-wide aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub num_positions: usize,
    /// Σ quantity * avg_price over all open positions
    pub total_invested: Decimal,
    /// Σ quantity * current_price over positions with a price
    pub total_current_value: Decimal,
    /// Unrealized P&L over positions with a price
    pub unrealized_pnl: Decimal,
    /// Unrealized P&L relative to the priced invested capital
    pub unrealized_pnl_percent: Option<Decimal>,
    pub realized_pnl: Decimal,
    pub total_pnl: Decimal,
    pub best_performer: Option<Performer>,
    pub worst_performer: Option<Performer>,
    /// Positions left out of current value: no price at all, or a value
    /// too large to represent
    pub unpriced: Vec<Symbol>,
    /// Positions valued from the stale cache
    pub stale: Vec<Symbol>,
}

/// `(current - base) / base * 100`, undefined for a zero base
pub fn percent_change(base: Decimal, current: Decimal) -> Option<Decimal> {
    if base.is_zero() {
        return None;
    }
    current
        .checked_sub(base)?
        .checked_div(base)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
}
