// End-to-end pipeline tests: scripted scrapers and a recording transport
// around a real in-memory store, so the whole run — retry, dedup gate,
// notification batching — is exercised without a browser or network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use watchdog::config::{
    AppConfig, DatabaseConfig, NotificationsConfig, SchedulerConfig, ScraperConfig,
};
use watchdog::models::{Candidate, SourceConfig, SourceKind};
use watchdog::notify::NotificationTransport;
use watchdog::pipeline::{ScrapePipeline, SourceScraper};
use watchdog::settings::FixedSettings;
use watchdog::store::SqliteStore;
use watchdog::AppError;

struct ScriptedScraper {
    results: HashMap<String, Vec<Candidate>>,
    failing: Vec<String>,
}

#[async_trait]
impl SourceScraper for ScriptedScraper {
    async fn scrape(&self, source: &SourceConfig) -> watchdog::Result<Vec<Candidate>> {
        if self.failing.contains(&source.name) {
            return Err(AppError::Navigation {
                url: source.target.clone(),
                message: "connection reset".to_string(),
            });
        }
        Ok(self.results.get(&source.name).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct RecordingTransport {
    texts: Mutex<Vec<String>>,
    photos: Mutex<Vec<String>>,
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send_text(&self, message: &str) -> watchdog::Result<()> {
        self.texts.lock().unwrap().push(message.to_string());
        Ok(())
    }

    async fn send_photo(&self, photo_url: &str, _caption: &str) -> watchdog::Result<()> {
        self.photos.lock().unwrap().push(photo_url.to_string());
        Ok(())
    }
}

fn source(name: &str) -> SourceConfig {
    SourceConfig {
        kind: SourceKind::Generic,
        name: name.to_string(),
        target: format!("https://{name}.example.com"),
        feed_target: None,
        region_label: None,
        region_value: None,
    }
}

fn candidate(n: u32) -> Candidate {
    Candidate::new(
        format!("https://rescue.example.com/dog/{n}"),
        format!("https://rescue.example.com/photos/{n}.jpg"),
    )
    .with_name(format!("Dog {n}"))
}

fn config(sources: Vec<SourceConfig>) -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        scraper: ScraperConfig {
            retry_attempts: 2,
            retry_delay_ms: 0,
            source_delay_ms: 0,
            settle_delay_ms: 0,
            ..ScraperConfig::default()
        },
        notifications: NotificationsConfig { message_delay_ms: 0 },
        scheduler: SchedulerConfig {
            fallback_interval_minutes: 60,
        },
        sources,
    }
}

async fn build_pipeline(
    sources: Vec<SourceConfig>,
    transport: Arc<RecordingTransport>,
) -> ScrapePipeline {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    ScrapePipeline::new(config(sources), store, Arc::new(FixedSettings::default()))
        .with_transport(transport)
}

#[tokio::test]
async fn full_run_saves_and_notifies() {
    let transport = Arc::new(RecordingTransport::default());
    let pipeline = build_pipeline(
        vec![source("dogshome"), source("petrescue")],
        Arc::clone(&transport),
    )
    .await;

    let scraper = ScriptedScraper {
        results: HashMap::from([
            (
                "dogshome".to_string(),
                vec![candidate(1), candidate(2), candidate(3)],
            ),
            // One overlap with dogshome: deduped at the gate.
            ("petrescue".to_string(), vec![candidate(3), candidate(4), candidate(5)]),
        ]),
        failing: vec![],
    };

    let summary = pipeline.run_with(&scraper).await.unwrap();

    assert_eq!(summary.total_inserted, 5);
    assert_eq!(summary.sources[0].inserted, 3);
    assert_eq!(summary.sources[1].inserted, 2);
    assert_eq!(summary.sources[1].duplicates, 1);

    // 5 individual photo notifications plus exactly one batch summary.
    assert_eq!(summary.notifications_sent, 5);
    assert_eq!(transport.photos.lock().unwrap().len(), 5);
    let texts = transport.texts.lock().unwrap();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("*5* new dogs"));
}

#[tokio::test]
async fn second_run_is_idempotent_and_quiet() {
    let transport = Arc::new(RecordingTransport::default());
    let pipeline = build_pipeline(vec![source("dogshome")], Arc::clone(&transport)).await;

    let scraper = ScriptedScraper {
        results: HashMap::from([("dogshome".to_string(), vec![candidate(1), candidate(2)])]),
        failing: vec![],
    };

    let first = pipeline.run_with(&scraper).await.unwrap();
    assert_eq!(first.total_inserted, 2);

    let second = pipeline.run_with(&scraper).await.unwrap();
    assert_eq!(second.total_inserted, 0);
    assert_eq!(second.sources[0].duplicates, 2);
    assert_eq!(second.notifications_sent, 0);

    // Only the first run produced deliveries (2 photos + 1 summary).
    assert_eq!(transport.photos.lock().unwrap().len(), 2);
    assert_eq!(transport.texts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failing_source_does_not_poison_the_run() {
    let transport = Arc::new(RecordingTransport::default());
    let pipeline = build_pipeline(
        vec![source("one"), source("two"), source("three")],
        Arc::clone(&transport),
    )
    .await;

    let scraper = ScriptedScraper {
        results: HashMap::from([
            ("one".to_string(), vec![candidate(1)]),
            ("three".to_string(), vec![candidate(3)]),
        ]),
        failing: vec!["two".to_string()],
    };

    let summary = pipeline.run_with(&scraper).await.unwrap();

    assert_eq!(summary.total_inserted, 2);
    assert_eq!(summary.sources[1].found, 0);
    assert!(summary.sources[1].error.as_deref().unwrap().contains("connection reset"));

    // A single new listing per surviving source still flushes individually;
    // two deliveries means a summary goes out too.
    assert_eq!(transport.photos.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn single_new_listing_sends_no_summary() {
    let transport = Arc::new(RecordingTransport::default());
    let pipeline = build_pipeline(vec![source("one")], Arc::clone(&transport)).await;

    let scraper = ScriptedScraper {
        results: HashMap::from([("one".to_string(), vec![candidate(1)])]),
        failing: vec![],
    };

    let summary = pipeline.run_with(&scraper).await.unwrap();

    assert_eq!(summary.notifications_sent, 1);
    assert_eq!(transport.photos.lock().unwrap().len(), 1);
    assert!(transport.texts.lock().unwrap().is_empty());
}
