use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::NotificationTransport;
use crate::settings::NotificationSettings;
use crate::utils::error::{AppError, Result};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API transport bound to one chat.
pub struct TelegramTransport {
    client: reqwest::Client,
    bot_token: String,
    chat_id: String,
    api_base: String,
}

impl TelegramTransport {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: TELEGRAM_API_BASE.to_string(),
        }
    }

    /// Build a transport from stored settings. Disabled or incomplete
    /// configuration yields `None`; callers treat that as "skip delivery",
    /// not as an error.
    pub fn from_settings(settings: &NotificationSettings) -> Option<Self> {
        if !settings.is_configured() {
            info!("Telegram notifications not enabled or not configured");
            return None;
        }
        Some(Self::new(settings.bot_token.clone(), settings.chat_id.clone()))
    }

    /// Point at a different API host. Used by tests.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn call(&self, method: &str, payload: serde_json::Value) -> Result<()> {
        let url = format!("{}/bot{}/{}", self.api_base, self.bot_token, method);
        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            return Err(AppError::Delivery(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let body: serde_json::Value = response.json().await?;
        if !body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
            let description = body
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or("no description");
            return Err(AppError::Delivery(format!("{method} rejected: {description}")));
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationTransport for TelegramTransport {
    async fn send_text(&self, message: &str) -> Result<()> {
        self.call(
            "sendMessage",
            json!({
                "chat_id": self.chat_id,
                "text": message,
                "parse_mode": "Markdown",
            }),
        )
        .await
    }

    async fn send_photo(&self, photo_url: &str, caption: &str) -> Result<()> {
        self.call(
            "sendPhoto",
            json!({
                "chat_id": self.chat_id,
                "photo": photo_url,
                "caption": caption,
                "parse_mode": "Markdown",
            }),
        )
        .await
    }
}
