use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use watchdog::config::AppConfig;
use watchdog::notify::TelegramTransport;
use watchdog::pipeline::ScrapePipeline;
use watchdog::scheduler::ScrapeScheduler;
use watchdog::settings::{DbSettings, SettingsProvider};
use watchdog::store::SqliteStore;

#[derive(Parser)]
#[command(name = "watchdog", about = "Dog adoption listing scraper", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape all configured sources once
    Run,
    /// Run immediately, then keep scraping on the configured interval
    Schedule,
    /// Send a test message through the configured notification transport
    TestNotify,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("watchdog=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let store = Arc::new(
        SqliteStore::connect(&config.database.url, config.database.max_connections).await?,
    );
    let settings = Arc::new(DbSettings::new(Arc::clone(&store)));

    match cli.command {
        Command::Run => {
            let pipeline = ScrapePipeline::new(config, store, settings);
            let summary = pipeline.run_all().await?;

            for outcome in &summary.sources {
                match &outcome.error {
                    Some(error) => info!("{}: failed ({})", outcome.source, error),
                    None => info!(
                        "{}: {} new, {} duplicates",
                        outcome.source, outcome.inserted, outcome.duplicates
                    ),
                }
            }
            info!(
                "Total: {} new listings, {} notifications sent",
                summary.total_inserted, summary.notifications_sent
            );
        }
        Command::Schedule => {
            let fallback = config.scheduler.fallback_interval_minutes;
            let pipeline = Arc::new(ScrapePipeline::new(
                config,
                store,
                Arc::clone(&settings) as Arc<dyn SettingsProvider>,
            ));
            let cancel = pipeline.cancel_flag();

            let mut scheduler =
                ScrapeScheduler::new(Arc::clone(&pipeline), settings.as_ref(), fallback).await?;
            scheduler.start().await?;

            info!("Scheduler running; press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;

            cancel.store(true, std::sync::atomic::Ordering::Relaxed);
            scheduler.shutdown().await?;
            info!("Shutting down...");
        }
        Command::TestNotify => {
            let notification_settings = settings.notification_settings().await?;
            match TelegramTransport::from_settings(&notification_settings) {
                Some(transport) => {
                    use watchdog::notify::NotificationTransport;
                    transport
                        .send_text("🤖 Watchdog bot test - connection successful!")
                        .await?;
                    info!("Test notification sent");
                }
                None => info!("Telegram notifications not enabled or not configured"),
            }
        }
    }

    Ok(())
}
