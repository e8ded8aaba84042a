use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An extracted, not-yet-deduplicated listing.
///
/// Extraction strategies only emit candidates that carry both a post URL and
/// an image URL; anything else is dropped at the extraction stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Candidate {
    /// Canonical URL of the original listing post. The dedup key.
    pub post_url: String,
    /// Absolute URL of the primary photo.
    pub image_url: String,
    pub name: Option<String>,
    pub breed: Option<String>,
    pub description: Option<String>,
}

impl Candidate {
    pub fn new(post_url: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            post_url: post_url.into(),
            image_url: image_url.into(),
            name: None,
            breed: None,
            description: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.is_empty() {
            self.name = Some(name);
        }
        self
    }

    pub fn with_breed(mut self, breed: impl Into<String>) -> Self {
        let breed = breed.into();
        if !breed.is_empty() {
            self.breed = Some(breed);
        }
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        if !description.is_empty() {
            self.description = Some(description);
        }
        self
    }

    /// Both halves of the record a listing cannot exist without.
    pub fn is_complete(&self) -> bool {
        !self.post_url.is_empty() && !self.image_url.is_empty()
    }
}

/// A listing as persisted in the store. Created exactly once by the pipeline;
/// edits happen only through the dashboard's CRUD surface.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct DogListing {
    pub id: i64,
    pub name: String,
    pub breed: String,
    pub post_url: String,
    pub image_url: String,
    pub description: String,
    pub scraped_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
