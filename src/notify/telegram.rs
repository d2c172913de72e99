//! Telegram Bot API delivery

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::common::errors::{Result, TrackerError};
use crate::common::traits::Notifier;
use crate::common::types::UserId;
use crate::config::types::TelegramConfig;

/// `sendMessage` request body
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: UserId,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

/// Envelope of every Bot API response
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

/// Sends notifications as Telegram messages to the user's chat
///
/// The user id is the chat id of their private chat with the bot.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    send_url: Url,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| TrackerError::Internal(e.to_string()))?;

        let send_url = Url::parse(&format!(
            "{}/bot{}/sendMessage",
            config.api_url.trim_end_matches('/'),
            config.bot_token
        ))
        .map_err(|e| TrackerError::Configuration(format!("invalid Telegram API URL: {}", e)))?;

        Ok(Self { client, send_url })
    }

    async fn send_message(&self, chat_id: UserId, text: &str) -> Result<()> {
        let body = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.send_url.clone())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        let parsed = serde_json::from_str::<ApiResponse>(&text).ok();
        match parsed {
            Some(api) if status.is_success() && api.ok => Ok(()),
            Some(api) => Err(TrackerError::NotifyFailed(format!(
                "Telegram error {}: {}",
                api.error_code.unwrap_or(status.as_u16()),
                api.description.unwrap_or_default()
            ))),
            None => Err(TrackerError::NotifyFailed(format!(
                "Telegram returned status {}: {}",
                status, text
            ))),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip(self, message))]
    async fn deliver(&self, user: UserId, message: &str) -> Result<()> {
        debug!("Sending Telegram message to {}", user);
        self.send_message(user, message).await.map_err(|e| match e {
            TrackerError::NotifyFailed(_) => e,
            other => TrackerError::NotifyFailed(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_url() {
        let mut config = TelegramConfig::new("123:abc");
        config.api_url = "https://api.telegram.org/".to_string();
        let notifier = TelegramNotifier::new(&config).unwrap();
        assert_eq!(
            notifier.send_url.as_str(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let body = SendMessageRequest {
            chat_id: 42,
            text: "hi",
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["chat_id"], 42);
        assert_eq!(json["parse_mode"], "Markdown");
        assert_eq!(json["disable_web_page_preview"], true);
    }
}
