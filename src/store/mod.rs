use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::models::{Candidate, DogListing};
use crate::utils::error::Result;

/// Outcome of pushing one batch of candidates through the dedup gate.
#[derive(Debug, Default, Clone)]
pub struct SaveReport {
    pub inserted: usize,
    pub duplicates: usize,
    /// Rows created by this call, in insertion order, awaiting notification.
    pub new_listings: Vec<DogListing>,
}

/// Read/write surface over the record store. The scraping pipeline only
/// creates rows; edits happen through the dashboard's CRUD surface.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn find_by_url(&self, post_url: &str) -> Result<Option<DogListing>>;
    async fn insert(&self, candidate: &Candidate) -> Result<DogListing>;

    /// The dedup gate: lookup by post URL, insert when absent, count the
    /// rest as duplicates.
    async fn save(&self, candidates: &[Candidate]) -> Result<SaveReport> {
        let mut report = SaveReport::default();
        for candidate in candidates {
            // Extraction discards incomplete candidates before they get here.
            if !candidate.is_complete() {
                continue;
            }
            if self.find_by_url(&candidate.post_url).await?.is_some() {
                debug!("DUPLICATE: {}", candidate.post_url);
                report.duplicates += 1;
                continue;
            }
            let listing = self.insert(candidate).await?;
            info!("NEW DOG: {} - {}", listing.name, listing.post_url);
            report.inserted += 1;
            report.new_listings.push(listing);
        }
        info!(
            "Save summary: {} new, {} duplicates",
            report.inserted, report.duplicates
        );
        Ok(report)
    }
}

/// SQLite-backed listing store. The UNIQUE constraint on post_url keeps the
/// one-listing-per-URL invariant even if two runs overlap.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// In-memory database, for tests.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dogs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                breed TEXT NOT NULL DEFAULT '',
                post_url TEXT NOT NULL UNIQUE,
                image_url TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                scraped_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL UNIQUE,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All listings, newest first. The dashboard's read path.
    pub async fn all_listings(&self) -> Result<Vec<DogListing>> {
        let rows = sqlx::query_as::<_, DogListing>("SELECT * FROM dogs ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ListingStore for SqliteStore {
    async fn find_by_url(&self, post_url: &str) -> Result<Option<DogListing>> {
        let row = sqlx::query_as::<_, DogListing>("SELECT * FROM dogs WHERE post_url = ? LIMIT 1")
            .bind(post_url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert(&self, candidate: &Candidate) -> Result<DogListing> {
        let now = Utc::now();
        // OR IGNORE: if a concurrent run inserted the same URL between the
        // gate's lookup and this insert, keep the existing row.
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO dogs
                (name, breed, post_url, image_url, description, scraped_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(candidate.name.as_deref().unwrap_or("Unknown"))
        .bind(candidate.breed.as_deref().unwrap_or(""))
        .bind(&candidate.post_url)
        .bind(&candidate.image_url)
        .bind(candidate.description.as_deref().unwrap_or(""))
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let listing =
            sqlx::query_as::<_, DogListing>("SELECT * FROM dogs WHERE post_url = ? LIMIT 1")
                .bind(&candidate.post_url)
                .fetch_one(&self.pool)
                .await?;
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(n: u32) -> Candidate {
        Candidate::new(
            format!("https://rescue.example.com/dog/{n}"),
            format!("https://rescue.example.com/photos/{n}.jpg"),
        )
        .with_name(format!("Dog {n}"))
    }

    #[tokio::test]
    async fn test_save_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        let candidates: Vec<Candidate> = (1..=3).map(candidate).collect();

        let first = store.save(&candidates).await.unwrap();
        assert_eq!(first.inserted, 3);
        assert_eq!(first.duplicates, 0);
        assert_eq!(first.new_listings.len(), 3);

        let second = store.save(&candidates).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 3);
        assert!(second.new_listings.is_empty());
    }

    #[tokio::test]
    async fn test_insert_applies_defaults() {
        let store = SqliteStore::in_memory().await.unwrap();
        let bare = Candidate::new(
            "https://rescue.example.com/dog/9",
            "https://rescue.example.com/photos/9.jpg",
        );

        let listing = store.insert(&bare).await.unwrap();
        assert_eq!(listing.name, "Unknown");
        assert_eq!(listing.breed, "");
        assert_eq!(listing.description, "");
        assert_eq!(listing.post_url, "https://rescue.example.com/dog/9");
    }

    #[tokio::test]
    async fn test_insert_same_url_twice_keeps_first_row() {
        let store = SqliteStore::in_memory().await.unwrap();
        let first = store.insert(&candidate(1).with_breed("Kelpie")).await.unwrap();
        let second = store
            .insert(&candidate(1).with_breed("Greyhound"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.breed, "Kelpie");
    }

    #[tokio::test]
    async fn test_find_by_url() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store
            .find_by_url("https://rescue.example.com/dog/1")
            .await
            .unwrap()
            .is_none());

        store.insert(&candidate(1)).await.unwrap();
        let found = store
            .find_by_url("https://rescue.example.com/dog/1")
            .await
            .unwrap();
        assert_eq!(found.unwrap().name, "Dog 1");
    }

    #[tokio::test]
    async fn test_incomplete_candidates_are_not_persisted() {
        let store = SqliteStore::in_memory().await.unwrap();
        let broken = vec![
            Candidate::new("https://rescue.example.com/dog/1", ""),
            Candidate::new("", "https://rescue.example.com/photos/1.jpg"),
        ];

        let report = store.save(&broken).await.unwrap();
        assert_eq!(report.inserted, 0);
        assert_eq!(report.duplicates, 0);
        assert!(store.all_listings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settings_roundtrip() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.get_setting("scrapeInterval").await.unwrap().is_none());

        store.set_setting("scrapeInterval", "30").await.unwrap();
        assert_eq!(
            store.get_setting("scrapeInterval").await.unwrap().as_deref(),
            Some("30")
        );

        store.set_setting("scrapeInterval", "45").await.unwrap();
        assert_eq!(
            store.get_setting("scrapeInterval").await.unwrap().as_deref(),
            Some("45")
        );
    }

    #[tokio::test]
    async fn test_all_listings_newest_first() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.insert(&candidate(1)).await.unwrap();
        store.insert(&candidate(2)).await.unwrap();

        let listings = store.all_listings().await.unwrap();
        assert_eq!(listings.len(), 2);
    }
}
