//! Alerts module - take-profit / stop-loss storage and evaluation

pub mod evaluator;
pub mod message;
pub mod store;
pub mod types;

pub use evaluator::AlertEvaluator;
pub use message::{format_usd, trigger_message};
pub use store::{AlertClaim, AlertStore, InMemoryAlertStore, DEFAULT_CLAIM_LEASE};
pub use types::{Alert, AlertKind, EvaluationReport, Trigger};
