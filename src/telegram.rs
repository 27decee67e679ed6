//! Delivery of rendered messages to a Telegram chat.
//!
//! Messages go out through the Bot API `sendMessage` method in HTML parse
//! mode. A platform rejection (`"ok": false`) or a transport failure is
//! returned as a [`DeliveryError`]; nothing is retried here.

use crate::config::Settings;
use crate::errors::DeliveryError;
use crate::models::{SendMessageRequest, TelegramResponse};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument};

/// Anything that can publish a rendered message.
pub trait Delivery {
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError>;
}

/// Bot API client bound to one destination chat.
pub struct TelegramClient {
    client: Client,
    base_url: String,
    token: String,
    chat_id: String,
    disable_link_preview: bool,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl TelegramClient {
    pub fn new(token: &str, chat_id: &str, settings: &Settings) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(DeliveryError::from)?;

        Ok(Self {
            client,
            base_url: settings.telegram_base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
            disable_link_preview: settings.disable_link_preview,
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.token)
    }
}

impl Delivery for TelegramClient {
    #[instrument(level = "info", skip_all, fields(chat_id = %self.chat_id, chars = message.chars().count()))]
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        let t0 = Instant::now();
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "HTML",
            disable_web_page_preview: self.disable_link_preview,
        };

        let response = self
            .client
            .post(self.send_message_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let e = DeliveryError::from(e);
                error!(error = %e, "Delivery request failed");
                e
            })?;

        let status = response.status();
        // The Bot API answers with a JSON envelope on errors too; prefer its
        // description over the bare status.
        let envelope = response.json::<TelegramResponse>().await.ok();

        match envelope {
            Some(envelope) if envelope.ok && status.is_success() => {
                info!(
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "Message delivered"
                );
                Ok(())
            }
            Some(envelope) => {
                let reason = envelope
                    .description
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
                error!(status = status.as_u16(), reason = %reason, "Message rejected");
                Err(DeliveryError::Rejected(reason))
            }
            None => {
                error!(status = status.as_u16(), "Delivery response was not a Bot API envelope");
                Err(DeliveryError::Status {
                    status: status.as_u16(),
                })
            }
        }
    }
}
