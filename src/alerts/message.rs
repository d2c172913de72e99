//! Notification text for triggered alerts

use rust_decimal::{Decimal, RoundingStrategy};

use super::types::{Alert, AlertKind, Trigger};
use crate::prices::PriceQuote;

/// USD amount for display: `$45,123.45`, `$1.23` or `$0.123456`
pub fn format_usd(amount: Decimal) -> String {
    let sign = if amount.is_sign_negative() && !amount.is_zero() { "-" } else { "" };
    let amount = amount.abs();

    if amount >= Decimal::ONE_THOUSAND {
        let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let text = format!("{:.2}", rounded);
        let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));
        format!("{}${}.{}", sign, group_thousands(whole), fraction)
    } else if amount >= Decimal::ONE {
        let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        format!("{}${:.2}", sign, rounded)
    } else {
        let rounded = amount.round_dp_with_strategy(6, RoundingStrategy::MidpointAwayFromZero);
        format!("{}${:.6}", sign, rounded)
    }
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Markdown message sent when an alert fires
pub fn trigger_message(alert: &Alert, trigger: &Trigger, quote: &PriceQuote) -> String {
    let (emoji, verb) = match trigger.kind {
        AlertKind::TakeProfit => ("🎯", "reached"),
        AlertKind::StopLoss => ("🛑", "fell to"),
    };

    let mut message = format!(
        "{} **{} ALERT: {}**\n\n{} {} your {} of `{}`\nCurrent price: `{}`",
        emoji,
        trigger.kind.to_string().to_uppercase(),
        alert.symbol,
        alert.symbol,
        verb,
        trigger.kind,
        format_usd(trigger.threshold),
        format_usd(trigger.price),
    );
    if quote.stale {
        message.push_str(&format!(
            "\n\n_Price as of {} UTC (live feed unavailable)_",
            quote.fetched_at.format("%Y-%m-%d %H:%M")
        ));
    }
    message.push_str("\n\nThis alert has been removed. Use /setalert to create a new one.");
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Symbol;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_usd_ranges() {
        assert_eq!(format_usd(dec!(45123.449)), "$45,123.45");
        assert_eq!(format_usd(dec!(1000)), "$1,000.00");
        assert_eq!(format_usd(dec!(1234567.8)), "$1,234,567.80");
        assert_eq!(format_usd(dec!(1.234)), "$1.23");
        assert_eq!(format_usd(dec!(0.1234564)), "$0.123456");
        assert_eq!(format_usd(dec!(-1500)), "-$1,500.00");
    }

    #[test]
    fn test_trigger_message_flags_stale_price() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let alert = Alert {
            user: 7,
            symbol: Symbol::Btc,
            take_profit: Some(dec!(80000)),
            stop_loss: None,
            created_at: at,
            updated_at: at,
        };
        let trigger = alert.check(dec!(81250.5)).unwrap();
        let mut quote = PriceQuote {
            symbol: Symbol::Btc,
            price: dec!(81250.5),
            fetched_at: at,
            stale: false,
        };

        let fresh = trigger_message(&alert, &trigger, &quote);
        assert!(fresh.contains("TAKE-PROFIT ALERT: BTC"));
        assert!(fresh.contains("`$80,000.00`"));
        assert!(fresh.contains("`$81,250.50`"));
        assert!(!fresh.contains("live feed unavailable"));

        quote.stale = true;
        let stale = trigger_message(&alert, &trigger, &quote);
        assert!(stale.contains("Price as of 2024-03-01 12:30 UTC"));
    }
}
