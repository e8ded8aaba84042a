use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

use crate::models::{SourceConfig, SourceKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scraper: ScraperConfig,
    pub notifications: NotificationsConfig,
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub headless: bool,
    pub chrome_path: Option<String>,
    pub user_agent: String,
    pub mobile_user_agent: String,
    /// Time allowed for one HTTP GET or page navigation, in seconds.
    pub request_timeout: u64,
    /// Time allowed for a single "wait for element" step.
    pub element_timeout_ms: u64,
    /// Pause after a UI action so asynchronous content can finish loading.
    /// Tests set this to zero.
    pub settle_delay_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Pause between sources to stay under target-site rate limits.
    pub source_delay_ms: u64,
    /// Relevance keywords for the generic image-link heuristic. Loose by
    /// intent; false positives are weeded out in the dashboard.
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Pause between individual deliveries to respect transport rate limits.
    pub message_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Used when the settings store has no scrape interval yet.
    pub fallback_interval_minutes: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            mobile_user_agent: "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Mobile Safari/537.36".to_string(),
            request_timeout: 15,
            element_timeout_ms: 5000,
            settle_delay_ms: 2000,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            source_delay_ms: 2000,
            keywords: default_keywords(),
        }
    }
}

pub fn default_keywords() -> Vec<String> {
    ["dog", "pet", "adopt", "puppy", "animal", "profile"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "WATCHDOG_"
            .add_source(Environment::with_prefix("WATCHDOG").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Add Chrome path from environment if not set
        if config.scraper.chrome_path.is_none() {
            config.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Message("Database URL must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if self.scraper.retry_attempts == 0 {
            return Err(ConfigError::Message(
                "Scraper retry_attempts must be at least 1".into(),
            ));
        }

        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message(
                "Scraper request_timeout must be greater than 0".into(),
            ));
        }

        if self.scraper.keywords.is_empty() {
            return Err(ConfigError::Message(
                "Scraper keyword list must not be empty".into(),
            ));
        }

        if self.scheduler.fallback_interval_minutes == 0 {
            return Err(ConfigError::Message(
                "Scheduler fallback_interval_minutes must be greater than 0".into(),
            ));
        }

        for source in &self.sources {
            if source.target.is_empty() {
                return Err(ConfigError::Message(format!(
                    "Source '{}' has an empty target",
                    source.name
                )));
            }
            if source.kind == SourceKind::Feed && source.feed_target.is_none() {
                return Err(ConfigError::Message(format!(
                    "Feed source '{}' must set feed_target to \"group\" or \"page\"",
                    source.name
                )));
            }
        }

        Ok(())
    }
}
