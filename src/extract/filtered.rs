use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{collect_pages, generic, PageSource};
use crate::fetch::browser::js_string;
use crate::fetch::PageHandle;
use crate::models::{Candidate, SourceConfig};
use crate::urls;
use crate::utils::error::Result;

/// Safety bound for the "load more" loop.
const MAX_PAGES: usize = 10;

/// Popup/interstitial close controls tried, in order, before filtering.
const MODAL_SELECTORS: &[&str] = &[
    ".tingle-btn--primary",
    ".modal-close",
    ".close-button",
    "[data-dismiss=\"modal\"]",
    ".popup-close",
    "button[aria-label=\"Close\"]",
    ".close",
];

/// Listing-card selectors tried, in order, on the filtered results page.
const CARD_SELECTORS: &[&str] = &[
    ".pet",
    ".animal",
    ".listing",
    ".card",
    ".dog-card",
    ".pet-card",
    "[data-pet]",
    ".adoption-listing",
    ".search-result",
    ".pet-listing",
    ".animal-listing",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilterStep {
    DismissModal,
    SelectSpecies,
    SelectRegion,
    Submit,
}

/// Result of one best-effort form manipulation. Failures are reported, not
/// raised: the parser proceeds with whatever the unfiltered page yields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterOutcome {
    pub step: FilterStep,
    pub applied: bool,
    pub detail: String,
}

fn species_filter_js() -> String {
    r#"(() => {
        const selects = document.querySelectorAll('select');
        for (const select of selects) {
            const options = Array.from(select.options);
            const dogOption = options.find((o) =>
                o.textContent && o.textContent.toLowerCase().includes('dog') &&
                !o.textContent.toLowerCase().includes('cat'));
            if (dogOption) {
                select.value = dogOption.value;
                select.dispatchEvent(new Event('change', { bubbles: true }));
                return JSON.stringify({ applied: true, detail: dogOption.textContent.trim() });
            }
        }
        return JSON.stringify({ applied: false, detail: 'no dog option found in any select' });
    })()"#
        .to_string()
}

fn region_filter_js(label: &str, value: &str) -> String {
    format!(
        r#"(() => {{
            const selects = document.querySelectorAll('select');
            for (const select of selects) {{
                const isStateSelect = select.name === 'state' || select.id === 'state' ||
                    select.className.includes('state');
                if (!isStateSelect) continue;
                const options = Array.from(select.options);
                let option = options.find((o) =>
                    o.textContent && o.textContent.toLowerCase().trim() === '{label}');
                if (!option && '{value}') option = options.find((o) => o.value === '{value}');
                if (!option) option = options.find((o) =>
                    o.textContent && o.textContent.toLowerCase().includes('{label}'));
                if (option) {{
                    select.value = option.value;
                    select.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    select.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    return JSON.stringify({{ applied: true, detail: option.textContent.trim() }});
                }}
            }}
            return JSON.stringify({{ applied: false, detail: 'no region select found' }});
        }})()"#,
        label = js_string(&label.to_lowercase()),
        value = js_string(value),
    )
}

fn submit_filter_js() -> String {
    r#"(() => {
        const buttons = document.querySelectorAll('button, input[type="submit"], input[type="button"]');
        for (const button of buttons) {
            const text = ((button.textContent || '') + ' ' + (button.value || '')).toLowerCase();
            if (text.includes('search') || text.includes('find') || text.includes('filter')) {
                button.click();
                return JSON.stringify({ applied: true, detail: (button.textContent || button.value || '').trim() });
            }
        }
        return JSON.stringify({ applied: false, detail: 'no search button found' });
    })()"#
        .to_string()
}

fn load_more_js() -> String {
    r#"(() => {
        const direct = document.querySelector('#search-more a') || document.querySelector('#search-more');
        const byText = Array.from(document.querySelectorAll('a')).find((a) => {
            const t = (a.textContent || '').toLowerCase();
            return t.includes('search more') || t.includes('show more') || t.includes('load more');
        });
        const button = direct || byText;
        if (button && button.offsetParent !== null) { button.click(); return true; }
        return false;
    })()"#
        .to_string()
}

fn outcome_from_json(step: FilterStep, value: serde_json::Value) -> FilterOutcome {
    FilterOutcome {
        step,
        applied: value
            .get("applied")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        detail: value
            .get("detail")
            .and_then(|v| v.as_str())
            .unwrap_or("step evaluation failed")
            .to_string(),
    }
}

/// Run the form-manipulation steps that constrain results to dogs in the
/// configured region. Every step is independently best-effort.
async fn apply_filters(page: &PageHandle, source: &SourceConfig) -> Vec<FilterOutcome> {
    let mut outcomes = Vec::new();

    let dismissed = MODAL_SELECTORS
        .iter()
        .find(|selector| page.try_click(selector));
    outcomes.push(FilterOutcome {
        step: FilterStep::DismissModal,
        applied: dismissed.is_some(),
        detail: dismissed
            .map(|s| s.to_string())
            .unwrap_or_else(|| "no modal present".to_string()),
    });
    if dismissed.is_some() {
        page.settle().await;
    }

    let species = page
        .eval_json(&species_filter_js())
        .unwrap_or(serde_json::Value::Null);
    outcomes.push(outcome_from_json(FilterStep::SelectSpecies, species));
    page.settle().await;

    let label = source.region_label.as_deref().unwrap_or("vic");
    let value = source.region_value.as_deref().unwrap_or("");
    let region = page
        .eval_json(&region_filter_js(label, value))
        .unwrap_or(serde_json::Value::Null);
    outcomes.push(outcome_from_json(FilterStep::SelectRegion, region));
    page.settle().await;

    let submit = page
        .eval_json(&submit_filter_js())
        .unwrap_or(serde_json::Value::Null);
    outcomes.push(outcome_from_json(FilterStep::Submit, submit));

    outcomes
}

/// Parse one page of filtered results. Structured card selectors are tried
/// in order; the first that matches anything wins. With no structured cards
/// at all, the generic image heuristic is the fallback.
pub fn parse_filtered_page(html: &str, base_url: &str, keywords: &[String]) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    let link_selector = Selector::parse("a").unwrap();
    let img_selector = Selector::parse("img").unwrap();

    for selector_str in CARD_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };

        let mut results = Vec::new();
        for card in document.select(&selector) {
            let Some(link) = card
                .select(&link_selector)
                .next()
                .or_else(|| enclosing_anchor(card))
            else {
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

            let alt = img.value().attr("alt").unwrap_or("");
            results.push(Candidate::new(post_url, image_url).with_name(alt));
        }

        if !results.is_empty() {
            return results;
        }
    }

    generic::extract_listings(html, base_url, keywords)
}

fn enclosing_anchor<'a>(card: ElementRef<'a>) -> Option<ElementRef<'a>> {
    card.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "a")
}

struct LoadMorePager<'a> {
    page: &'a PageHandle,
}

#[async_trait]
impl PageSource for LoadMorePager<'_> {
    async fn html(&mut self) -> Result<String> {
        self.page.settle().await;
        self.page.content()
    }

    async fn advance(&mut self) -> bool {
        self.page.eval_bool(&load_more_js())
    }
}

/// Scrape a filtered search site: constrain the results with best-effort
/// form steps, then collect pages through the "load more" loop.
pub async fn run(
    page: &PageHandle,
    source: &SourceConfig,
    keywords: &[String],
) -> Result<Vec<Candidate>> {
    let start_url = source.start_url();
    page.goto(&start_url).await?;
    page.settle().await;

    for outcome in apply_filters(page, source).await {
        if outcome.applied {
            info!("Filter step {:?} applied: {}", outcome.step, outcome.detail);
        } else {
            warn!(
                "Filter step {:?} skipped, continuing unfiltered: {}",
                outcome.step, outcome.detail
            );
        }
    }

    let mut pager = LoadMorePager { page };
    Ok(collect_pages(&mut pager, MAX_PAGES, |html| {
        parse_filtered_page(html, &start_url, keywords)
    })
    .await)
}
