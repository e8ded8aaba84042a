use serde::{Deserialize, Serialize};

pub mod listing;
pub mod source;

// Re-exports for convenience
pub use listing::*;
pub use source::*;

/// Which retrieval + extraction strategy a source uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Static HTTP GET, generic image-link heuristic.
    Generic,
    /// Rendered page with a "next" control clicked until it disappears.
    Paginated,
    /// Rendered page with form-driven filters and a "load more" loop.
    Filtered,
    /// Authenticated social feed on the mobile site.
    Feed,
}

impl SourceKind {
    pub fn needs_browser(&self) -> bool {
        !matches!(self, SourceKind::Generic)
    }

    pub fn needs_login(&self) -> bool {
        matches!(self, SourceKind::Feed)
    }
}
