use serde::{Deserialize, Serialize};

/// A ranked cluster of similar question fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub representative_text: String,
    /// Number of candidates merged into this topic; always >= 1.
    pub member_count: usize,
    /// Sum of member weights; drives the final ranking.
    pub total_weight: u32,
    /// Capped selection of original phrasings for display.
    pub examples: Vec<String>,
}
