use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{AppConfig, ScraperConfig};
use crate::extract::{feed, filtered, generic, paginated};
use crate::fetch::{HeadlessBrowser, StaticFetcher, TabProfile};
use crate::models::{Candidate, SourceConfig, SourceKind};
use crate::notify::{NotificationQueue, NotificationTransport, TelegramTransport};
use crate::session::{FeedSession, MobileLoginSurface};
use crate::settings::SettingsProvider;
use crate::store::ListingStore;
use crate::utils::error::{AppError, Result};

/// Per-source result row in a run summary.
#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub source: String,
    pub kind: SourceKind,
    pub found: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceOutcome>,
    pub total_inserted: usize,
    pub notifications_sent: usize,
}

/// Fetch + extract for one source. Split out as a trait so the orchestration
/// policy (retry, isolation, delays, counting) is testable without a browser.
#[async_trait]
pub trait SourceScraper: Send + Sync {
    async fn scrape(&self, source: &SourceConfig) -> Result<Vec<Candidate>>;
}

/// Production scraper: static fetches over reqwest, rendered fetches over one
/// shared browser, one shared authenticated session per run.
pub struct DefaultScraper {
    config: ScraperConfig,
    fetcher: StaticFetcher,
    // Launched on first rendered source; a launch failure is cached so every
    // rendered source in the run degrades while static sources proceed.
    browser: OnceLock<std::result::Result<HeadlessBrowser, String>>,
    session: tokio::sync::Mutex<Option<FeedSession>>,
}

impl DefaultScraper {
    pub async fn new(config: &ScraperConfig, settings: &dyn SettingsProvider) -> Result<Self> {
        let fetcher = StaticFetcher::new(config)?;
        let credentials = settings.feed_credentials().await?;
        Ok(Self {
            config: config.clone(),
            fetcher,
            browser: OnceLock::new(),
            session: tokio::sync::Mutex::new(credentials.map(FeedSession::new)),
        })
    }

    fn browser(&self) -> Result<&HeadlessBrowser> {
        self.browser
            .get_or_init(|| HeadlessBrowser::launch(&self.config).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| AppError::BrowserLaunch(e.clone()))
    }
}

#[async_trait]
impl SourceScraper for DefaultScraper {
    async fn scrape(&self, source: &SourceConfig) -> Result<Vec<Candidate>> {
        match source.kind {
            SourceKind::Generic => {
                let html = self.fetcher.fetch(&source.target).await?;
                Ok(generic::extract_listings(
                    &html,
                    &source.target,
                    &self.config.keywords,
                ))
            }
            SourceKind::Paginated => {
                let page = self.browser()?.open_tab(TabProfile::Desktop)?;
                let result = paginated::run(&page, source).await;
                page.close();
                result
            }
            SourceKind::Filtered => {
                let page = self.browser()?.open_tab(TabProfile::Desktop)?;
                let result = filtered::run(&page, source, &self.config.keywords).await;
                page.close();
                result
            }
            SourceKind::Feed => {
                let page = self.browser()?.open_tab(TabProfile::Mobile)?;
                let mut guard = self.session.lock().await;
                let Some(session) = guard.as_mut() else {
                    page.close();
                    return Err(AppError::MissingCredentials {
                        name: source.name.clone(),
                    });
                };
                let mut surface = MobileLoginSurface::new(&page);
                if let Err(e) = session.login(&mut surface).await {
                    page.close();
                    return Err(e);
                }
                drop(guard);

                let result = feed::run(&page, source).await;
                page.close();
                result
            }
        }
    }
}

/// The orchestrator: iterates configured sources one at a time, retries each
/// with a fixed strategy, hands candidates to the dedup gate and flushes the
/// notification queue once at the end of the run.
pub struct ScrapePipeline {
    config: AppConfig,
    store: Arc<dyn ListingStore>,
    settings: Arc<dyn SettingsProvider>,
    transport_override: Option<Arc<dyn NotificationTransport>>,
    cancelled: Arc<AtomicBool>,
}

impl ScrapePipeline {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn ListingStore>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        Self {
            config,
            store,
            settings,
            transport_override: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the settings-derived delivery transport. Tests inject a fake.
    pub fn with_transport(mut self, transport: Arc<dyn NotificationTransport>) -> Self {
        self.transport_override = Some(transport);
        self
    }

    /// Shared flag checked at the top of each per-source iteration; setting
    /// it stops the run between sources, never mid-extraction.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub async fn run_all(&self) -> Result<RunSummary> {
        let scraper = DefaultScraper::new(&self.config.scraper, self.settings.as_ref()).await?;
        self.run_with(&scraper).await
    }

    pub async fn run_with(&self, scraper: &dyn SourceScraper) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            "Starting scrape run {} over {} sources",
            run_id,
            self.config.sources.len()
        );

        let mut queue = NotificationQueue::new(Duration::from_millis(
            self.config.notifications.message_delay_ms,
        ));
        let source_delay = Duration::from_millis(self.config.scraper.source_delay_ms);
        let mut outcomes = Vec::new();

        for (index, source) in self.config.sources.iter().enumerate() {
            if self.cancelled.load(Ordering::Relaxed) {
                info!("Cancellation requested, stopping before source {}", source.name);
                break;
            }
            if index > 0 {
                tokio::time::sleep(source_delay).await;
            }

            let outcome = self.scrape_source(scraper, source, &mut queue).await?;
            info!(
                "Source {}: {} found, {} new, {} duplicates",
                outcome.source, outcome.found, outcome.inserted, outcome.duplicates
            );
            outcomes.push(outcome);
        }

        let transport = self.transport().await;
        let notifications_sent = queue.flush(transport.as_deref()).await;

        let total_inserted = outcomes.iter().map(|o| o.inserted).sum();
        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            sources: outcomes,
            total_inserted,
            notifications_sent,
        };
        info!(
            "Run {} finished: {} new listings, {} notifications",
            run_id, summary.total_inserted, summary.notifications_sent
        );
        Ok(summary)
    }

    /// One source: bounded retry around fetch+extract, then the dedup gate.
    /// Exhausted retries degrade to a zero-result outcome; only store
    /// failures propagate.
    async fn scrape_source(
        &self,
        scraper: &dyn SourceScraper,
        source: &SourceConfig,
        queue: &mut NotificationQueue,
    ) -> Result<SourceOutcome> {
        let attempts = self.config.scraper.retry_attempts.max(1) as usize;
        let strategy =
            FixedInterval::from_millis(self.config.scraper.retry_delay_ms).take(attempts - 1);

        match Retry::spawn(strategy, || scraper.scrape(source)).await {
            Ok(candidates) => {
                let report = self.store.save(&candidates).await?;
                let outcome = SourceOutcome {
                    source: source.name.clone(),
                    kind: source.kind,
                    found: candidates.len(),
                    inserted: report.inserted,
                    duplicates: report.duplicates,
                    error: None,
                };
                queue.enqueue(report.new_listings);
                Ok(outcome)
            }
            Err(e) => {
                warn!(
                    "Source {} failed after {} attempts: {}",
                    source.name, attempts, e
                );
                Ok(SourceOutcome {
                    source: source.name.clone(),
                    kind: source.kind,
                    found: 0,
                    inserted: 0,
                    duplicates: 0,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    async fn transport(&self) -> Option<Arc<dyn NotificationTransport>> {
        if let Some(transport) = &self.transport_override {
            return Some(Arc::clone(transport));
        }
        match self.settings.notification_settings().await {
            Ok(settings) => TelegramTransport::from_settings(&settings)
                .map(|t| Arc::new(t) as Arc<dyn NotificationTransport>),
            Err(e) => {
                warn!("Could not read notification settings: {}", e);
                None
            }
        }
    }
}
