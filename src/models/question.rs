use serde::{Deserialize, Serialize};

/// One question-like fragment submitted to clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionCandidate {
    /// Back-reference to the post this fragment came from (lookup only).
    pub source_post_id: String,
    pub text: String,
    /// Engagement score: the source post's reaction count for body
    /// fragments, a smaller base weight for comment fragments.
    pub weight: u32,
}
