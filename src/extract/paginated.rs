use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use super::{clean_breed, collect_pages, PageSource};
use crate::fetch::PageHandle;
use crate::models::{Candidate, SourceConfig};
use crate::urls;
use crate::utils::error::Result;

/// Safety bound against infinite-loop pager bugs on the target site. A
/// deliberate policy, not a discovered limit.
const MAX_PAGES: usize = 20;

/// Image alt text the site uses for cards that have no real photo yet.
const PLACEHOLDER_NAME: &str = "dog adoption photo";

/// Card selectors for the paginated shelter listing. Defaults match the
/// markup observed on dogshome.com.
#[derive(Debug, Clone)]
pub struct CardSelectors {
    pub container: String,
    pub name: String,
    pub breed: String,
    pub next: String,
}

impl Default for CardSelectors {
    fn default() -> Self {
        Self {
            container: ".col-sm-4.col-md-2.col-halfPadding".to_string(),
            name: ".thumbnailCaption h3".to_string(),
            breed: ".thumbnailCaption p:last-child".to_string(),
            next: "ul.pager li.next a".to_string(),
        }
    }
}

/// Parse one rendered listing page into candidates. A malformed card skips
/// only that card.
pub fn parse_listing_page(html: &str, base_url: &str, selectors: &CardSelectors) -> Vec<Candidate> {
    let document = Html::parse_document(html);

    let container = match Selector::parse(&selectors.container) {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid card container selector {:?}: {:?}", selectors.container, e);
            return Vec::new();
        }
    };
    let name_selector = match Selector::parse(&selectors.name) {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid name selector {:?}: {:?}", selectors.name, e);
            return Vec::new();
        }
    };
    let breed_selector = Selector::parse(&selectors.breed).ok();
    let link_selector = Selector::parse("a").unwrap();
    let img_selector = Selector::parse("img").unwrap();

    let mut results = Vec::new();
    for card in document.select(&container) {
        let Some(link) = card.select(&link_selector).next() else {
            continue;
        };
        let Some(img) = card.select(&img_selector).next() else {
            continue;
        };
        let Some(post_url) = link
            .value()
            .attr("href")
            .and_then(|href| urls::resolve(base_url, href))
        else {
            continue;
        };
        let Some(image_url) = img
            .value()
            .attr("src")
            .and_then(|src| urls::resolve(base_url, src))
        else {
            continue;
        };

        let name = match card.select(&name_selector).next() {
            Some(el) => element_text(el),
            None => continue,
        };
        if name.is_empty() || name.eq_ignore_ascii_case(PLACEHOLDER_NAME) {
            continue;
        }

        let breed = breed_selector
            .as_ref()
            .and_then(|sel| card.select(sel).next())
            .map(|el| clean_breed(&element_text(el)))
            .unwrap_or_default();

        results.push(
            Candidate::new(post_url, image_url)
                .with_name(name)
                .with_breed(breed),
        );
    }

    results
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

struct BrowserPager<'a> {
    page: &'a PageHandle,
    next_selector: String,
}

#[async_trait]
impl PageSource for BrowserPager<'_> {
    async fn html(&mut self) -> Result<String> {
        self.page.settle().await;
        self.page.content()
    }

    async fn advance(&mut self) -> bool {
        self.page.try_click(&self.next_selector)
    }
}

/// Scrape a paginated listing site: parse each page, click "next" while it
/// is present and visible, stop when it disappears or the page cap is hit.
pub async fn run(page: &PageHandle, source: &SourceConfig) -> Result<Vec<Candidate>> {
    let start_url = source.start_url();
    page.goto(&start_url).await?;

    let selectors = CardSelectors::default();
    let mut pager = BrowserPager {
        page,
        next_selector: selectors.next.clone(),
    };

    Ok(collect_pages(&mut pager, MAX_PAGES, |html| {
        parse_listing_page(html, &start_url, &selectors)
    })
    .await)
}
