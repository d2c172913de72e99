//! CoinGecko API response types

use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;

/// Response of `GET /simple/price?ids=..&vs_currencies=usd`
///
/// ```json
/// {"bitcoin": {"usd": 45123.45}, "ethereum": {"usd": 3012.1}}
/// ```
pub type SimplePriceResponse = HashMap<String, HashMap<String, serde_json::Number>>;

/// Error body returned on failures (including 429)
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub status: Option<ErrorStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorStatus {
    #[serde(default)]
    pub error_code: Option<u16>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ErrorResponse {
    pub fn message(&self) -> Option<String> {
        self.error.clone().or_else(|| {
            self.status
                .as_ref()
                .and_then(|status| status.error_message.clone())
        })
    }
}

/// Convert a JSON number to a Decimal without going through f64 arithmetic
pub fn number_to_decimal(number: &serde_json::Number) -> Option<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
