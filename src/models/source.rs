use serde::{Deserialize, Serialize};

use crate::models::SourceKind;

/// Which feed URL shape an authenticated source uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedTarget {
    Group,
    Page,
}

/// One configured origin to scrape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Short label used in logs and run summaries.
    pub name: String,
    /// URL for generic/paginated/filtered sources; group id or page name for
    /// feed sources.
    pub target: String,
    /// Required when `kind` is `Feed`.
    #[serde(default)]
    pub feed_target: Option<FeedTarget>,
    /// Filtered search only: visible label of the region option, e.g. "VIC".
    #[serde(default)]
    pub region_label: Option<String>,
    /// Filtered search only: option value fallback when no label matches.
    #[serde(default)]
    pub region_value: Option<String>,
}

impl SourceConfig {
    /// The URL the source's first navigation goes to.
    pub fn start_url(&self) -> String {
        match (self.kind, self.feed_target) {
            (SourceKind::Feed, Some(FeedTarget::Group)) => {
                format!("https://m.facebook.com/groups/{}", self.target)
            }
            (SourceKind::Feed, _) => {
                format!("https://m.facebook.com/{}/posts", self.target)
            }
            _ => self.target.clone(),
        }
    }
}
