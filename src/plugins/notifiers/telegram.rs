use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::{NotificationsConfig, TelegramConfig};
use crate::plugins::traits::{NotificationEvent, NotificationResult, NotifierPlugin};
use crate::utils::error::{AppError, Result};

pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
    currency_symbol: String,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    result: Option<SentMessage>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

impl TelegramNotifier {
    /// `None` when the bot token or chat id is missing.
    pub fn from_config(config: &NotificationsConfig) -> Result<Option<Self>> {
        let telegram: &TelegramConfig = &config.telegram;
        let Some((token, chat_id)) = telegram.credentials() else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(telegram.request_timeout_secs))
            .build()?;

        Ok(Some(Self {
            client,
            api_base: telegram.api_base.trim_end_matches('/').to_string(),
            bot_token: token.to_string(),
            chat_id: chat_id.to_string(),
            currency_symbol: config.currency_symbol.clone(),
        }))
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    pub async fn send_text(&self, text: &str) -> Result<NotificationResult> {
        let response = self
            .client
            .post(self.endpoint())
            .form(&[("chat_id", self.chat_id.as_str()), ("text", text)])
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Telegram response: {}", status);
        if !status.is_success() {
            return Err(AppError::Notification {
                notifier: self.plugin_type().to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let body: SendMessageResponse = response.json().await?;
        if !body.ok {
            return Err(AppError::Notification {
                notifier: self.plugin_type().to_string(),
                message: body.description.unwrap_or_else(|| "request rejected".to_string()),
            });
        }

        Ok(NotificationResult {
            success: true,
            message_id: body.result.map(|m| m.message_id.to_string()),
        })
    }
}

#[async_trait]
impl NotifierPlugin for TelegramNotifier {
    fn name(&self) -> &str {
        "Telegram Notifier"
    }

    fn plugin_type(&self) -> &str {
        "telegram"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult> {
        self.send_text(&event.render(&self.currency_symbol)).await
    }
}
