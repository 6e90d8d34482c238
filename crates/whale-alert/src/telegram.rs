//! Telegram delivery sink.
//!
//! Fire-and-forget: a failed send is logged and dropped. The tracker never
//! retries deliveries and never treats a delivery failure as fatal.

use crate::error::{AlertError, AlertResult};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use whale_core::AlertSink;

/// Timeout for sendMessage requests.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Telegram bot API notifier for one chat.
pub struct TelegramNotifier {
    client: Client,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> AlertResult<Self> {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| AlertError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }

    /// Deliver one message, reporting the failure kind to the caller.
    ///
    /// Used by the `AlertSink` impl, which downgrades failures to warnings.
    pub async fn deliver(&self, message: &str) -> AlertResult<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let params = [
            ("chat_id", self.chat_id.as_str()),
            ("text", message),
            ("parse_mode", "HTML"),
            ("disable_web_page_preview", "true"),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AlertError::Delivery(format!("sendMessage failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AlertError::Delivery(format!(
                "sendMessage HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        debug!("Alert delivered");
        Ok(())
    }
}

#[async_trait]
impl AlertSink for TelegramNotifier {
    async fn send(&self, message: &str) {
        if let Err(e) = self.deliver(message).await {
            warn!(%e, "Alert delivery failed (dropped)");
        }
    }
}
