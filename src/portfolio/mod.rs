//! Portfolio module - positions, transaction history and realized P&L

pub mod history;
pub mod ledger;
pub mod types;

pub use history::{RealizedPnlLog, TransactionLog};
pub use ledger::PositionLedger;
pub use types::{
    percent_change, BuyOutcome, Performer, PortfolioSummary, Position, PositionView,
    RealizedPnlRecord, RemoveOutcome, SellOutcome, Transaction,
};
