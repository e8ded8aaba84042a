use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use crate::fetch::PageHandle;
use crate::models::{Candidate, SourceConfig};
use crate::urls;
use crate::utils::error::Result;

/// Marker the mobile site puts on the div holding a post's permalink.
const POST_LINK_SELECTOR: &str = "._78cz";

/// Class marking a complete story unit, found by walking up from the link.
const STORY_CONTAINER_CLASS: &str = "story_body_container";

/// Image classes observed on mobile feed posts, in preference order.
const IMAGE_CLASSES: &[&str] = &["_5sgi", "_2sxw", "datstx6m"];

/// Bound on the ancestor walk from permalink to story container.
const MAX_ANCESTOR_HOPS: usize = 10;

/// Scroll-to-bottom passes used to trigger lazy loading.
const SCROLL_PASSES: u32 = 2;

/// Parse a rendered mobile feed page. A record is kept only when both the
/// permalink and an image resolve.
pub fn parse_feed_page(html: &str) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    let link_holder_selector = Selector::parse(POST_LINK_SELECTOR).unwrap();
    let anchor_selector = Selector::parse("a").unwrap();

    let mut results: Vec<Candidate> = Vec::new();
    for holder in document.select(&link_holder_selector) {
        let link = if holder.value().name() == "a" {
            Some(holder)
        } else {
            holder.select(&anchor_selector).next()
        };
        let Some(link) = link else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(absolute) = urls::resolve("https://m.facebook.com", href) else {
            continue;
        };
        let post_url = urls::to_canonical_facebook(&absolute);

        let Some(container) = story_container(holder) else {
            continue;
        };
        let Some(image_url) = first_post_image(container) else {
            continue;
        };

        if results.iter().any(|c| c.post_url == post_url) {
            continue;
        }
        results.push(Candidate::new(post_url, image_url));
    }

    results
}

/// Walk up from the permalink holder looking for the story container, giving
/// up after a bounded number of hops.
fn story_container(holder: ElementRef<'_>) -> Option<ElementRef<'_>> {
    if has_story_class(holder) {
        return Some(holder);
    }
    holder
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(MAX_ANCESTOR_HOPS)
        .find(|el| has_story_class(*el))
}

fn has_story_class(el: ElementRef<'_>) -> bool {
    el.value()
        .attr("class")
        .map(|classes| classes.contains(STORY_CONTAINER_CLASS))
        .unwrap_or(false)
}

/// Try the known image classes in order; take the first image's `src`, or
/// fall back to a URL parsed out of its `background-image` style.
fn first_post_image(container: ElementRef<'_>) -> Option<String> {
    for class in IMAGE_CLASSES {
        let Ok(selector) = Selector::parse(&format!("img.{class}")) else {
            continue;
        };
        if let Some(img) = container.select(&selector).next() {
            if let Some(src) = img.value().attr("src") {
                if !src.is_empty() {
                    return Some(src.to_string());
                }
            }
            if let Some(style) = img.value().attr("style") {
                if let Some(url) = background_image_url(style) {
                    return Some(url);
                }
            }
        }
    }
    None
}

fn background_image_url(style: &str) -> Option<String> {
    let pattern = Regex::new(r#"url\(["']?([^"')]+)["']?\)"#).unwrap();
    pattern
        .captures(style)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Scrape an authenticated feed. The caller is responsible for having logged
/// the shared session in on this tab's browsing context.
pub async fn run(page: &PageHandle, source: &SourceConfig) -> Result<Vec<Candidate>> {
    let url = source.start_url();
    page.goto(&url).await?;

    if !page.wait_for(POST_LINK_SELECTOR) {
        warn!("No post containers appeared at {}", url);
        return Ok(Vec::new());
    }

    page.scroll_to_bottom(SCROLL_PASSES).await;

    let html = page.content()?;
    Ok(parse_feed_page(&html))
}
