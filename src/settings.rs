use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::store::SqliteStore;
use crate::utils::error::Result;

const KEY_SCRAPE_INTERVAL: &str = "scrapeInterval";
const KEY_FEED_EMAIL: &str = "facebookEmail";
const KEY_FEED_PASSWORD: &str = "facebookPassword";
const KEY_BOT_TOKEN: &str = "telegramBotToken";
const KEY_CHAT_ID: &str = "telegramChatId";
const KEY_NOTIFICATIONS_ENABLED: &str = "telegramNotificationsEnabled";

const DEFAULT_SCRAPE_INTERVAL_MINUTES: u64 = 60;

/// Login pair for the authenticated feed source. Arrives already decrypted;
/// this module performs no cryptography.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identity: String,
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub bot_token: String,
    pub chat_id: String,
}

impl NotificationSettings {
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.bot_token.trim().is_empty() && !self.chat_id.trim().is_empty()
    }
}

/// The settings collaborator consumed by the pipeline. Backed by the
/// dashboard-managed settings table in production.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn feed_credentials(&self) -> Result<Option<Credentials>>;
    async fn scrape_interval_minutes(&self) -> Result<u64>;
    async fn notification_settings(&self) -> Result<NotificationSettings>;
}

pub struct DbSettings {
    store: Arc<SqliteStore>,
}

impl DbSettings {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    async fn get_or_default(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .store
            .get_setting(key)
            .await?
            .unwrap_or_else(|| default.to_string()))
    }
}

#[async_trait]
impl SettingsProvider for DbSettings {
    async fn feed_credentials(&self) -> Result<Option<Credentials>> {
        let identity = self.get_or_default(KEY_FEED_EMAIL, "").await?;
        let secret = self.get_or_default(KEY_FEED_PASSWORD, "").await?;

        if identity.trim().is_empty() || secret.trim().is_empty() {
            debug!("Feed credentials not configured");
            return Ok(None);
        }
        Ok(Some(Credentials { identity, secret }))
    }

    async fn scrape_interval_minutes(&self) -> Result<u64> {
        let raw = self.get_or_default(KEY_SCRAPE_INTERVAL, "").await?;
        Ok(raw
            .parse()
            .ok()
            .filter(|minutes| *minutes > 0)
            .unwrap_or(DEFAULT_SCRAPE_INTERVAL_MINUTES))
    }

    async fn notification_settings(&self) -> Result<NotificationSettings> {
        let enabled = self
            .get_or_default(KEY_NOTIFICATIONS_ENABLED, "false")
            .await?
            == "true";
        let bot_token = self.get_or_default(KEY_BOT_TOKEN, "").await?;
        let chat_id = self.get_or_default(KEY_CHAT_ID, "").await?;

        Ok(NotificationSettings {
            enabled,
            bot_token,
            chat_id,
        })
    }
}

/// Provider with fixed values. Used by tests and one-off CLI invocations
/// that bypass the settings table.
#[derive(Debug, Clone, Default)]
pub struct FixedSettings {
    pub credentials: Option<Credentials>,
    pub interval_minutes: Option<u64>,
    pub notifications: Option<NotificationSettings>,
}

#[async_trait]
impl SettingsProvider for FixedSettings {
    async fn feed_credentials(&self) -> Result<Option<Credentials>> {
        Ok(self.credentials.clone())
    }

    async fn scrape_interval_minutes(&self) -> Result<u64> {
        Ok(self
            .interval_minutes
            .unwrap_or(DEFAULT_SCRAPE_INTERVAL_MINUTES))
    }

    async fn notification_settings(&self) -> Result<NotificationSettings> {
        Ok(self.notifications.clone().unwrap_or(NotificationSettings {
            enabled: false,
            bot_token: String::new(),
            chat_id: String::new(),
        }))
    }
}
