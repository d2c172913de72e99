//! Error types for the application

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias using our TrackerError
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Main error type for ledger, alert and price-feed operations
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Malformed or out-of-range quantity, price or threshold
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Symbol outside the supported whitelist
    #[error("Unsupported symbol: {0}")]
    UnsupportedSymbol(String),

    /// Position or alert does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Sell or partial removal exceeds the current holding
    #[error("Insufficient quantity for {symbol}: requested {requested}, available {available}")]
    InsufficientQuantity {
        symbol: String,
        requested: Decimal,
        available: Decimal,
    },

    /// Take-profit must sit strictly above stop-loss
    #[error("Invalid thresholds: take-profit {take_profit} must be above stop-loss {stop_loss}")]
    InvalidThresholds {
        take_profit: Decimal,
        stop_loss: Decimal,
    },

    /// Price feed exhausted its retries and has no usable stale entry
    #[error("Price unavailable: {0}")]
    Unavailable(String),

    /// Notification could not be delivered
    #[error("Notification delivery failed: {0}")]
    NotifyFailed(String),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Rate limiting errors
    #[error("Rate limit exceeded: {message}, retry after {retry_after_seconds:?} seconds")]
    RateLimit {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    /// Invalid API response
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TrackerError {
    /// Errors caused by a bad request. These go straight back to the user and
    /// are never retried.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            TrackerError::InvalidInput(_)
                | TrackerError::UnsupportedSymbol(_)
                | TrackerError::NotFound(_)
                | TrackerError::InsufficientQuantity { .. }
                | TrackerError::InvalidThresholds { .. }
        )
    }

    /// Upstream faults worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TrackerError::HttpRequest(_)
                | TrackerError::RateLimit { .. }
                | TrackerError::InvalidResponse(_)
                | TrackerError::JsonParse(_)
        )
    }
}
