use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::pipeline::ScrapePipeline;
use crate::settings::SettingsProvider;

/// Thin wrapper that re-runs the pipeline on the interval stored in
/// settings. Runs once immediately on start, then on every tick; a tick is
/// skipped while the previous run is still going.
pub struct ScrapeScheduler {
    scheduler: JobScheduler,
    pipeline: Arc<ScrapePipeline>,
    interval_minutes: u64,
    running: Arc<AtomicBool>,
}

impl ScrapeScheduler {
    pub async fn new(
        pipeline: Arc<ScrapePipeline>,
        settings: &dyn SettingsProvider,
        fallback_minutes: u64,
    ) -> Result<Self> {
        let interval_minutes = settings
            .scrape_interval_minutes()
            .await
            .unwrap_or(fallback_minutes);

        Ok(Self {
            scheduler: JobScheduler::new().await?,
            pipeline,
            interval_minutes,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn interval_minutes(&self) -> u64 {
        self.interval_minutes
    }

    pub fn is_run_in_progress(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn start(&mut self) -> Result<()> {
        info!(
            "Starting scheduler with {} minute interval",
            self.interval_minutes
        );

        // Initial run before the first tick.
        Self::run_once(&self.pipeline, &self.running).await;

        let pipeline = Arc::clone(&self.pipeline);
        let running = Arc::clone(&self.running);
        let job = Job::new_repeated_async(
            Duration::from_secs(self.interval_minutes * 60),
            move |_uuid, _lock| {
                let pipeline = Arc::clone(&pipeline);
                let running = Arc::clone(&running);
                Box::pin(async move {
                    Self::run_once(&pipeline, &running).await;
                })
            },
        )?;

        self.scheduler.add(job).await?;
        self.scheduler.start().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        info!("Scheduler shutdown");
        Ok(())
    }

    async fn run_once(pipeline: &ScrapePipeline, running: &AtomicBool) {
        if running.swap(true, Ordering::SeqCst) {
            warn!("Previous scrape run still in progress, skipping this tick");
            return;
        }

        match pipeline.run_all().await {
            Ok(summary) => info!(
                "Scheduled scrape finished: {} new listings across {} sources",
                summary.total_inserted,
                summary.sources.len()
            ),
            Err(e) => error!("Scheduled scrape failed: {}", e),
        }

        running.store(false, Ordering::SeqCst);
    }
}
