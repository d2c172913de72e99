//! Append-only transaction log and realized P&L records

use rust_decimal::Decimal;

use super::types::{checked_sum, RealizedPnlRecord, Transaction};
use crate::common::errors::Result;
use crate::common::types::Symbol;

/// Per-user transaction history in insertion (= timestamp) order
#[derive(Debug, Clone, Default)]
pub struct TransactionLog {
    entries: Vec<Transaction>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next appended transaction will get
    pub fn next_id(&self) -> u64 {
        self.entries.len() as u64 + 1
    }

    pub fn append(&mut self, transaction: Transaction) {
        self.entries.push(transaction);
    }

    /// Most recent first
    pub fn recent(&self, limit: usize) -> Vec<Transaction> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

}

/// Per-user realized P&L records, written only by sells
#[derive(Debug, Clone, Default)]
pub struct RealizedPnlLog {
    records: Vec<RealizedPnlRecord>,
}

impl RealizedPnlLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: RealizedPnlRecord) {
        self.records.push(record);
    }

    pub fn records(&self, symbol: Option<Symbol>) -> Vec<RealizedPnlRecord> {
        self.records
            .iter()
            .filter(|r| symbol.map_or(true, |s| r.symbol == s))
            .cloned()
            .collect()
    }

    pub fn total(&self) -> Result<Decimal> {
        checked_sum(self.records.iter().map(|r| r.pnl), "realized P&L")
    }
}
