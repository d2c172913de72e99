//! Unified types used across the ledger, alerts and price feed

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::{Result, TrackerError};

/// Identity of a user, already validated by the command layer (chat id)
pub type UserId = i64;

/// Supported crypto assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Symbol {
    Btc,
    Eth,
    Sol,
    Bnb,
    Xrp,
    Ada,
    Avax,
    Dot,
    Matic,
    Link,
    Uni,
    Atom,
    Ltc,
    Bch,
    Xlm,
}

impl Symbol {
    /// Every supported symbol, in display order
    pub const ALL: [Symbol; 15] = [
        Symbol::Btc,
        Symbol::Eth,
        Symbol::Sol,
        Symbol::Bnb,
        Symbol::Xrp,
        Symbol::Ada,
        Symbol::Avax,
        Symbol::Dot,
        Symbol::Matic,
        Symbol::Link,
        Symbol::Uni,
        Symbol::Atom,
        Symbol::Ltc,
        Symbol::Bch,
        Symbol::Xlm,
    ];

    /// Ticker as shown to users
    pub fn as_str(&self) -> &'static str {
        match self {
            Symbol::Btc => "BTC",
            Symbol::Eth => "ETH",
            Symbol::Sol => "SOL",
            Symbol::Bnb => "BNB",
            Symbol::Xrp => "XRP",
            Symbol::Ada => "ADA",
            Symbol::Avax => "AVAX",
            Symbol::Dot => "DOT",
            Symbol::Matic => "MATIC",
            Symbol::Link => "LINK",
            Symbol::Uni => "UNI",
            Symbol::Atom => "ATOM",
            Symbol::Ltc => "LTC",
            Symbol::Bch => "BCH",
            Symbol::Xlm => "XLM",
        }
    }

    /// CoinGecko coin id used by the upstream price endpoint
    pub fn coingecko_id(&self) -> &'static str {
        match self {
            Symbol::Btc => "bitcoin",
            Symbol::Eth => "ethereum",
            Symbol::Sol => "solana",
            Symbol::Bnb => "binancecoin",
            Symbol::Xrp => "ripple",
            Symbol::Ada => "cardano",
            Symbol::Avax => "avalanche-2",
            Symbol::Dot => "polkadot",
            Symbol::Matic => "matic-network",
            Symbol::Link => "chainlink",
            Symbol::Uni => "uniswap",
            Symbol::Atom => "cosmos",
            Symbol::Ltc => "litecoin",
            Symbol::Bch => "bitcoin-cash",
            Symbol::Xlm => "stellar",
        }
    }

    /// Reverse lookup from a CoinGecko coin id
    pub fn from_coingecko_id(id: &str) -> Option<Symbol> {
        Symbol::ALL.into_iter().find(|s| s.coingecko_id() == id)
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Symbol {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_uppercase();
        Symbol::ALL
            .into_iter()
            .find(|sym| sym.as_str() == wanted)
            .ok_or_else(|| TrackerError::UnsupportedSymbol(s.trim().to_string()))
    }
}

/// Kind of ledger mutation recorded in the transaction log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Remove,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Remove => write!(f, "REMOVE"),
        }
    }
}

/// Parse a user-supplied quantity. Must be strictly positive.
pub fn parse_quantity(raw: &str) -> Result<Decimal> {
    let value = parse_decimal(raw, "quantity")?;
    if value <= Decimal::ZERO {
        return Err(TrackerError::InvalidInput(format!(
            "quantity must be positive, got {}",
            value
        )));
    }
    Ok(value)
}

/// Parse a user-supplied price. Zero is allowed (airdrops, gifts).
pub fn parse_price(raw: &str) -> Result<Decimal> {
    let value = parse_decimal(raw, "price")?;
    if value < Decimal::ZERO {
        return Err(TrackerError::InvalidInput(format!(
            "price must not be negative, got {}",
            value
        )));
    }
    Ok(value)
}

fn parse_decimal(raw: &str, field: &str) -> Result<Decimal> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
    let cleaned = cleaned.strip_prefix('$').unwrap_or(&cleaned);
    Decimal::from_str(cleaned)
        .or_else(|_| Decimal::from_scientific(cleaned))
        .map_err(|_| TrackerError::InvalidInput(format!("{} is not a number: {:?}", field, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_symbol_parsing_is_case_insensitive() {
        assert_eq!("btc".parse::<Symbol>().unwrap(), Symbol::Btc);
        assert_eq!(" Matic ".parse::<Symbol>().unwrap(), Symbol::Matic);
    }

    #[test]
    fn test_unknown_symbol_is_rejected() {
        let err = "DOGE".parse::<Symbol>().unwrap_err();
        assert!(matches!(err, TrackerError::UnsupportedSymbol(ref s) if s == "DOGE"));
    }

    #[test]
    fn test_whitelist_has_fifteen_unique_entries() {
        let mut ids: Vec<_> = Symbol::ALL.iter().map(|s| s.coingecko_id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 15);
    }

    #[test]
    fn test_coingecko_round_trip() {
        for symbol in Symbol::ALL {
            assert_eq!(Symbol::from_coingecko_id(symbol.coingecko_id()), Some(symbol));
        }
        assert_eq!(Symbol::from_coingecko_id("dogecoin"), None);
    }

    #[test]
    fn test_symbol_serializes_as_ticker() {
        let json = serde_json::to_string(&Symbol::Avax).unwrap();
        assert_eq!(json, "\"AVAX\"");
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0.5").unwrap(), dec!(0.5));
        assert_eq!(parse_quantity("1,000").unwrap(), dec!(1000));
        assert!(matches!(parse_quantity("0"), Err(TrackerError::InvalidInput(_))));
        assert!(matches!(parse_quantity("-1"), Err(TrackerError::InvalidInput(_))));
        assert!(matches!(parse_quantity("abc"), Err(TrackerError::InvalidInput(_))));
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("$45,000").unwrap(), dec!(45000));
        assert_eq!(parse_price("0").unwrap(), Decimal::ZERO);
        assert!(matches!(parse_price("-5"), Err(TrackerError::InvalidInput(_))));
    }
}
