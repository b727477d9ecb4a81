use serde::{Deserialize, Serialize};

/// One scraped feed item. Immutable once created; lives only for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPost {
    /// Permalink-derived identifier, or a content hash when the DOM offers
    /// no anchor. Unique within a run.
    pub id: String,
    /// Full body text; may be empty for e.g. image-only posts.
    pub text: String,
    /// Extracted comment bodies in display order.
    pub comment_texts: Vec<String>,
    /// Engagement signal; 0 when unreadable.
    pub reaction_count: u32,
    /// Opaque timestamp string as shown in the feed ("2h", "March 3"...).
    pub timestamp_raw: String,
}
