//! Integration tests for the price feed and the HTTP adapters
//!
//! The CoinGecko and Telegram clients run against local wiremock servers, so
//! no real network access or API keys are needed.

mod common;

use common::{coingecko_responses, harness, ScriptedPriceSource, ALICE};
use crypto_portfolio_alerts::config::types::{PriceFeedConfig, TelegramConfig};
use crypto_portfolio_alerts::{
    CoinGeckoClient, Notifier, PriceSource, Symbol, TelegramNotifier, TrackerError,
};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Cache, throttle and stale fallback
// ============================================================================

#[test_log::test(tokio::test)]
async fn test_stale_fallback_after_exhausted_retries() {
    let h = harness();
    let prices = h.tracker.prices();
    h.source.set_price(Symbol::Btc, dec!(61000));
    prices.get_price(Symbol::Btc, true).await.unwrap();

    // Cache entry is now 20 minutes old: past the TTL, inside the ceiling
    h.clock.advance(Duration::from_secs(20 * 60));
    h.source.set_failing(true);
    let calls_before = h.source.calls();

    let quote = prices.get_price(Symbol::Btc, true).await.unwrap();

    assert_eq!(quote.price, dec!(61000));
    assert!(quote.stale);
    assert_eq!(h.source.calls() - calls_before, 3);
}

#[tokio::test]
async fn test_unavailable_past_staleness_ceiling() {
    let h = harness();
    let prices = h.tracker.prices();
    h.source.set_price(Symbol::Uni, dec!(7.5));
    prices.get_price(Symbol::Uni, true).await.unwrap();

    h.clock.advance(Duration::from_secs(61 * 60));
    h.source.set_failing(true);

    let result = prices.get_price(Symbol::Uni, true).await;

    assert!(matches!(result, Err(TrackerError::Unavailable(_))));
}

#[tokio::test]
async fn test_calls_are_spaced_by_min_interval() {
    let h = harness();
    let prices = h.tracker.prices();
    h.source.set_price(Symbol::Btc, dec!(60000));
    h.source.set_price(Symbol::Eth, dec!(3000));

    prices.get_price(Symbol::Btc, false).await.unwrap();
    prices.get_price(Symbol::Eth, false).await.unwrap();

    assert_eq!(h.source.calls(), 2);
    assert_eq!(h.clock.sleeps(), vec![Duration::from_millis(2500)]);
}

#[tokio::test]
async fn test_duplicate_symbols_fetched_once() {
    let h = harness();
    h.source.set_price(Symbol::Sol, dec!(140));

    let batch = h
        .tracker
        .prices()
        .get_prices(&[Symbol::Sol, Symbol::Sol, Symbol::Sol], true)
        .await
        .unwrap();

    assert_eq!(batch.len(), 1);
    assert_eq!(h.source.requests(), vec![vec![Symbol::Sol]]);
}

#[tokio::test]
async fn test_scripted_source_single_fetch_contract() {
    let source = ScriptedPriceSource::new();
    source.set_price(Symbol::Bch, dec!(480));

    assert_eq!(source.fetch_price(Symbol::Bch).await.unwrap(), dec!(480));
    assert!(matches!(
        source.fetch_price(Symbol::Ltc).await,
        Err(TrackerError::InvalidResponse(_))
    ));
}

// ============================================================================
// CoinGecko client
// ============================================================================

async fn coingecko_client(server: &MockServer) -> CoinGeckoClient {
    let config = PriceFeedConfig {
        base_url: server.uri(),
        api_key: Some("demo-key".to_string()),
        ..PriceFeedConfig::default()
    };
    CoinGeckoClient::from_config(&config).expect("Failed to create CoinGecko client")
}

#[tokio::test]
async fn test_coingecko_simple_price() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .and(query_param("ids", "bitcoin,ethereum"))
        .and(query_param("vs_currencies", "usd"))
        .and(header("x-cg-demo-api-key", "demo-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(coingecko_responses::BTC_ETH, "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;
    let client = coingecko_client(&server).await;

    let prices = client
        .fetch_prices(&[Symbol::Btc, Symbol::Eth])
        .await
        .unwrap();

    assert_eq!(prices.len(), 2);
    assert_eq!(prices[&Symbol::Btc], dec!(67234.12));
    assert_eq!(prices[&Symbol::Eth], dec!(3456.7));
}

#[tokio::test]
async fn test_coingecko_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/price"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "30")
                .set_body_raw(coingecko_responses::RATE_LIMITED, "application/json"),
        )
        .mount(&server)
        .await;
    let client = coingecko_client(&server).await;

    let err = client.fetch_prices(&[Symbol::Btc]).await.unwrap_err();

    match err {
        TrackerError::RateLimit {
            message,
            retry_after_seconds,
        } => {
            assert_eq!(message, "You've exceeded the Rate Limit.");
            assert_eq!(retry_after_seconds, Some(30));
        }
        other => panic!("expected rate limit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_coingecko_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let client = coingecko_client(&server).await;

    let err = client.fetch_prices(&[Symbol::Ada]).await.unwrap_err();

    assert!(matches!(err, TrackerError::InvalidResponse(_)));
    assert!(err.is_transient());
}

// ============================================================================
// Telegram notifier
// ============================================================================

fn telegram_notifier(server: &MockServer) -> TelegramNotifier {
    let config = TelegramConfig {
        api_url: server.uri(),
        ..TelegramConfig::new("123:abc")
    };
    TelegramNotifier::new(&config).expect("Failed to create Telegram notifier")
}

#[tokio::test]
async fn test_telegram_delivers_markdown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_partial_json(serde_json::json!({
            "chat_id": ALICE,
            "text": "*hi*",
            "parse_mode": "Markdown",
            "disable_web_page_preview": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": {"message_id": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = telegram_notifier(&server);

    assert!(notifier.deliver(ALICE, "*hi*").await.is_ok());
}

#[tokio::test]
async fn test_telegram_failure_is_notify_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "ok": false,
            "error_code": 403,
            "description": "Forbidden: bot was blocked by the user"
        })))
        .mount(&server)
        .await;

    let err = telegram_notifier(&server)
        .deliver(ALICE, "hello")
        .await
        .unwrap_err();

    match err {
        TrackerError::NotifyFailed(reason) => assert!(reason.contains("blocked")),
        other => panic!("expected NotifyFailed, got {:?}", other),
    }
}
