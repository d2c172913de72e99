//! Per-user position ledger

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, instrument, warn};

use super::history::{RealizedPnlLog, TransactionLog};
use super::types::{
    checked, checked_sum, BuyOutcome, Performer, PortfolioSummary, Position, PositionView,
    RealizedPnlRecord, RemoveOutcome, SellOutcome, Transaction,
};
use crate::common::clock::Clock;
use crate::common::errors::{Result, TrackerError};
use crate::common::types::{Action, Symbol, UserId};
use crate::prices::PriceService;

/// Everything the ledger owns for one user
#[derive(Debug, Default)]
struct Book {
    positions: BTreeMap<Symbol, Position>,
    transactions: TransactionLog,
    realized: RealizedPnlLog,
}

/// Position ledger with write-through transaction and realized P&L logs
///
/// All mutations for a user happen under one lock, so concurrent sells of
/// the same position are serialized and each mutation either lands
/// completely (position, transaction, realized record) or not at all.
pub struct PositionLedger {
    books: Mutex<HashMap<UserId, Book>>,
    prices: Arc<PriceService>,
    clock: Arc<dyn Clock>,
}

impl PositionLedger {
    pub fn new(prices: Arc<PriceService>, clock: Arc<dyn Clock>) -> Self {
        Self {
            books: Mutex::new(HashMap::new()),
            prices,
            clock,
        }
    }

    fn books(&self) -> Result<MutexGuard<'_, HashMap<UserId, Book>>> {
        self.books
            .lock()
            .map_err(|_| TrackerError::Internal("ledger lock poisoned".to_string()))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Record a buy, opening the position or averaging into it
    #[instrument(skip(self))]
    pub fn add(
        &self,
        user: UserId,
        symbol: Symbol,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<BuyOutcome> {
        validate_quantity(quantity)?;
        validate_price(price)?;

        let now = self.clock.now();
        let mut books = self.books()?;
        let book = books.entry(user).or_default();

        let (position, created) = match book.positions.get(&symbol) {
            Some(existing) => (existing.with_buy(quantity, price, now)?, false),
            None => (Position::open(symbol, quantity, price, now)?, true),
        };

        let transaction = Transaction {
            id: book.transactions.next_id(),
            action: Action::Buy,
            symbol,
            quantity,
            price,
            timestamp: now,
            realized_pnl: None,
            avg_cost_at_sale: None,
        };

        book.positions.insert(symbol, position.clone());
        book.transactions.append(transaction);

        info!(
            "{} {} position for user {}: qty {} @ avg {}",
            if created { "Created" } else { "Updated" },
            symbol,
            user,
            position.quantity,
            position.avg_price
        );

        Ok(BuyOutcome { created, position })
    }

    /// Record a sell and lock in its P&L against the current average cost
    #[instrument(skip(self))]
    pub fn sell(
        &self,
        user: UserId,
        symbol: Symbol,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<SellOutcome> {
        validate_quantity(quantity)?;
        validate_price(price)?;

        let now = self.clock.now();
        let mut books = self.books()?;
        let book = books
            .get_mut(&user)
            .ok_or_else(|| position_not_found(user, symbol))?;
        let position = book
            .positions
            .get(&symbol)
            .ok_or_else(|| position_not_found(user, symbol))?;

        let remaining = position.with_reduction(quantity, now)?;
        let avg_cost = position.avg_price;
        let pnl = checked(
            (price - avg_cost).checked_mul(quantity),
            "realized P&L",
        )?;

        let record = RealizedPnlRecord {
            symbol,
            quantity_sold: quantity,
            sell_price: price,
            avg_cost_at_sale: avg_cost,
            pnl,
            timestamp: now,
        };
        let transaction = Transaction {
            id: book.transactions.next_id(),
            action: Action::Sell,
            symbol,
            quantity,
            price,
            timestamp: now,
            realized_pnl: Some(pnl),
            avg_cost_at_sale: Some(avg_cost),
        };

        // Nothing below can fail: commit all three together
        match &remaining {
            Some(position) => {
                book.positions.insert(symbol, position.clone());
            }
            None => {
                book.positions.remove(&symbol);
            }
        }
        book.realized.append(record.clone());
        book.transactions.append(transaction);

        info!(
            "Sold {} {} for user {} at {}: realized P&L {}",
            quantity, symbol, user, price, pnl
        );

        Ok(SellOutcome { record, remaining })
    }

    /// Remove units (or the whole position) without recording any P&L
    #[instrument(skip(self))]
    pub fn remove(
        &self,
        user: UserId,
        symbol: Symbol,
        quantity: Option<Decimal>,
    ) -> Result<RemoveOutcome> {
        if let Some(quantity) = quantity {
            validate_quantity(quantity)?;
        }

        let now = self.clock.now();
        let mut books = self.books()?;
        let book = books
            .get_mut(&user)
            .ok_or_else(|| position_not_found(user, symbol))?;
        let position = book
            .positions
            .get(&symbol)
            .ok_or_else(|| position_not_found(user, symbol))?;

        let quantity_removed = quantity.unwrap_or(position.quantity);
        let remaining = position.with_reduction(quantity_removed, now)?;

        let transaction = Transaction {
            id: book.transactions.next_id(),
            action: Action::Remove,
            symbol,
            quantity: quantity_removed,
            price: position.avg_price,
            timestamp: now,
            realized_pnl: None,
            avg_cost_at_sale: None,
        };

        match &remaining {
            Some(position) => {
                book.positions.insert(symbol, position.clone());
            }
            None => {
                book.positions.remove(&symbol);
            }
        }
        book.transactions.append(transaction);

        info!(
            "Removed {} {} for user {} ({})",
            quantity_removed,
            symbol,
            user,
            if remaining.is_some() { "partial" } else { "full" }
        );

        Ok(RemoveOutcome {
            symbol,
            quantity_removed,
            remaining,
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current position
    pub fn get(&self, user: UserId, symbol: Symbol) -> Result<Position> {
        self.books()?
            .get(&user)
            .and_then(|book| book.positions.get(&symbol))
            .cloned()
            .ok_or_else(|| position_not_found(user, symbol))
    }

    /// Open positions without prices, ordered by symbol
    pub fn positions(&self, user: UserId) -> Result<Vec<Position>> {
        Ok(self
            .books()?
            .get(&user)
            .map(|book| book.positions.values().cloned().collect())
            .unwrap_or_default())
    }

    /// Open positions joined with current (or last known) prices
    pub async fn list(&self, user: UserId) -> Result<Vec<PositionView>> {
        let positions = self.positions(user)?;
        if positions.is_empty() {
            return Ok(Vec::new());
        }

        let symbols: Vec<Symbol> = positions.iter().map(|p| p.symbol).collect();
        let quotes = self.prices.get_prices(&symbols, true).await?;

        Ok(positions
            .into_iter()
            .map(|position| {
                let quote = quotes.get(&position.symbol).copied();
                if quote.is_none() {
                    warn!("No price available for {}", position.symbol);
                }
                PositionView::new(position, quote)
            })
            .collect())
    }

    /// Portfolio aggregates over open positions plus all realized P&L
    pub async fn summary(&self, user: UserId) -> Result<PortfolioSummary> {
        let views = self.list(user).await?;
        let realized_pnl = self.total_realized_pnl(user)?;
        summarize(&views, realized_pnl)
    }

    /// Transaction history, most recent first
    pub fn transactions(&self, user: UserId, limit: usize) -> Result<Vec<Transaction>> {
        Ok(self
            .books()?
            .get(&user)
            .map(|book| book.transactions.recent(limit))
            .unwrap_or_default())
    }

    /// Realized P&L records, optionally for one symbol, oldest first
    pub fn realized_pnl(&self, user: UserId, symbol: Option<Symbol>) -> Result<Vec<RealizedPnlRecord>> {
        Ok(self
            .books()?
            .get(&user)
            .map(|book| book.realized.records(symbol))
            .unwrap_or_default())
    }

    pub fn total_realized_pnl(&self, user: UserId) -> Result<Decimal> {
        match self.books()?.get(&user) {
            Some(book) => book.realized.total(),
            None => Ok(Decimal::ZERO),
        }
    }
}

fn validate_quantity(quantity: Decimal) -> Result<()> {
    if quantity <= Decimal::ZERO {
        return Err(TrackerError::InvalidInput(format!(
            "quantity must be positive, got {}",
            quantity
        )));
    }
    Ok(())
}

fn validate_price(price: Decimal) -> Result<()> {
    if price < Decimal::ZERO {
        return Err(TrackerError::InvalidInput(format!(
            "price must not be negative, got {}",
            price
        )));
    }
    Ok(())
}

fn position_not_found(user: UserId, symbol: Symbol) -> TrackerError {
    TrackerError::NotFound(format!("no {} position for user {}", symbol, user))
}

fn summarize(views: &[PositionView], realized_pnl: Decimal) -> Result<PortfolioSummary> {
    let total_invested = checked_sum(views.iter().map(|v| v.invested), "total invested")?;
    let valued: Vec<&PositionView> = views.iter().filter(|v| v.current_value.is_some()).collect();

    let total_current_value = checked_sum(
        valued.iter().filter_map(|v| v.current_value),
        "total current value",
    )?;
    let priced_invested = checked_sum(valued.iter().map(|v| v.invested), "total invested")?;
    let unrealized_pnl = checked(
        total_current_value.checked_sub(priced_invested),
        "unrealized P&L",
    )?;
    let unrealized_pnl_percent = if priced_invested.is_zero() {
        None
    } else {
        unrealized_pnl
            .checked_div(priced_invested)
            .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
    };

    let ranked: Vec<Performer> = views
        .iter()
        .filter_map(|v| {
            v.unrealized_pnl_percent.map(|pnl_percent| Performer {
                symbol: v.position.symbol,
                pnl_percent,
            })
        })
        .collect();
    let best_performer = ranked.iter().max_by_key(|p| p.pnl_percent).cloned();
    let worst_performer = ranked.iter().min_by_key(|p| p.pnl_percent).cloned();

    Ok(PortfolioSummary {
        num_positions: views.len(),
        total_invested,
        total_current_value,
        unrealized_pnl,
        unrealized_pnl_percent,
        realized_pnl,
        total_pnl: checked(unrealized_pnl.checked_add(realized_pnl), "total P&L")?,
        best_performer,
        worst_performer,
        unpriced: views
            .iter()
            .filter(|v| v.current_value.is_none())
            .map(|v| v.position.symbol)
            .collect(),
        stale: views
            .iter()
            .filter(|v| v.is_stale())
            .map(|v| v.position.symbol)
            .collect(),
    })
}
