use async_trait::async_trait;
use tracing::{debug, warn};

use crate::models::Candidate;
use crate::utils::error::Result;

pub mod feed;
pub mod filtered;
pub mod generic;
pub mod paginated;

/// The capabilities a multi-page strategy needs from a live page: read the
/// current DOM, and try to reveal more content. Implemented over a browser
/// tab in production and over canned page sequences in tests.
#[async_trait]
pub trait PageSource: Send {
    async fn html(&mut self) -> Result<String>;

    /// Attempt to move to the next page / load more results. Returns whether
    /// the control was found, visible and activated.
    async fn advance(&mut self) -> bool;
}

/// Shared pagination loop: parse each page, dedup by post URL within the
/// run, and advance until the control disappears or the cap is hit. A page
/// read failure ends the loop with whatever was collected so far.
pub async fn collect_pages(
    source: &mut dyn PageSource,
    max_pages: usize,
    parse: impl Fn(&str) -> Vec<Candidate>,
) -> Vec<Candidate> {
    let mut collected: Vec<Candidate> = Vec::new();
    let mut pages = 0;

    while pages < max_pages {
        pages += 1;

        let html = match source.html().await {
            Ok(html) => html,
            Err(e) => {
                warn!("Page read failed on pass {}, keeping partial results: {}", pages, e);
                break;
            }
        };

        let found = parse(&html);
        let before = collected.len();
        for candidate in found {
            if !candidate.is_complete() {
                continue;
            }
            if collected.iter().any(|c| c.post_url == candidate.post_url) {
                continue;
            }
            collected.push(candidate);
        }
        debug!(
            "Pass {}: {} new candidates ({} total)",
            pages,
            collected.len() - before,
            collected.len()
        );

        if !source.advance().await {
            break;
        }
    }

    collected
}

/// Normalize scraped breed text: keep the leading segment before any
/// comma-separated qualifiers ("…, 5 years, Male"), fold the "(crossed)" and
/// "(mixed)" suffixes into "X Cross" / "X Mix", drop a trailing " Dog" and
/// standardize the mixed-breed spelling.
pub fn clean_breed(raw: &str) -> String {
    let mut breed = raw.split(',').next().unwrap_or("").trim().to_string();

    if let Some(stripped) = breed.strip_suffix("(crossed)") {
        breed = format!("{} Cross", stripped.trim_end());
    } else if let Some(stripped) = breed.strip_suffix("(mixed)") {
        breed = format!("{} Mix", stripped.trim_end());
    }

    if let Some(stripped) = breed.strip_suffix(" Dog") {
        breed = stripped.to_string();
    }

    if breed.eq_ignore_ascii_case("mixed breed") {
        breed = "Mixed Breed".to_string();
    }

    breed
}

/// Split the "Name - Breed" titles some sites put in image alt text.
pub fn split_name_and_breed(title: &str) -> (String, Option<String>) {
    match title.split_once(" - ") {
        Some((name, breed)) => (name.trim().to_string(), Some(clean_breed(breed))),
        None => (title.trim().to_string(), None),
    }
}
