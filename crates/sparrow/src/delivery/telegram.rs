//! Telegram Bot API delivery sink.
//!
//! Sends summaries as plain text (no parse_mode, so model output can
//! never break entity parsing) and honors the per-account privacy flag
//! via `protect_content`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;

use crate::summarizer::Summary;

use super::{DeliveryError, DeliverySink};

/// Telegram caps messages at 4096 chars; leave headroom for the marker.
const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    protect_content: bool,
}

/// Delivery sink backed by the Telegram Bot API.
pub struct TelegramSink {
    client: Client,
    api_base: String,
    bot_token: SecretString,
}

impl TelegramSink {
    pub fn new(
        api_base: String,
        bot_token: SecretString,
        timeout_secs: u64,
    ) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DeliveryError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base,
            bot_token,
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base.trim_end_matches('/'),
            self.bot_token.expose_secret(),
            method
        )
    }
}

/// Truncates to the message limit, appending an ellipsis when cut.
fn truncate_for_telegram(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_MESSAGE_CHARS - 3).collect();
    format!("{}...", cut)
}

#[async_trait]
impl DeliverySink for TelegramSink {
    async fn deliver(
        &self,
        chat_id: i64,
        summary: &Summary,
        protect: bool,
    ) -> Result<(), DeliveryError> {
        let text = truncate_for_telegram(&summary.rendered());
        let request = SendMessageRequest {
            chat_id,
            text: &text,
            protect_content: protect,
        };

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&request)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Api(format!(
                "Telegram returned {}: {}",
                status, body
            )));
        }

        debug!(chat_id, message_id = %summary.message_id, "Delivered summary");
        Ok(())
    }
}
