mod cluster;
mod questions;
mod semantic;

pub use cluster::LexicalStrategy;
pub use questions::extract_candidates;
pub use semantic::SemanticStrategy;

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::models::{QuestionCandidate, Topic};
use async_trait::async_trait;

/// One of two interchangeable grouping strategies. The delegated-semantic
/// variant always falls back to the lexical one; callers never see its
/// transport failures.
#[async_trait]
pub trait ClusterStrategy: Send + Sync {
    async fn cluster(&self, candidates: &[QuestionCandidate]) -> Result<Vec<Topic>>;
}

/// Turns index groups into ranked topics. Shared by both strategies so
/// ranking and representative selection behave identically regardless of
/// how the groups were formed.
///
/// Ranking: total weight desc, then member count desc, then first-seen
/// candidate order. Representative: highest-weight member, earliest on ties.
pub(crate) fn build_ranked_topics(
    candidates: &[QuestionCandidate],
    mut groups: Vec<Vec<usize>>,
    config: &AnalysisConfig,
    top_n: usize,
) -> Vec<Topic> {
    groups.retain(|g| !g.is_empty());
    // First-seen order of a group is the order of its earliest member.
    groups.sort_by_key(|g| g.iter().copied().min().unwrap_or(usize::MAX));

    let mut topics: Vec<(usize, Topic)> = groups
        .into_iter()
        .map(|members| {
            let first_seen = members[0];
            let total_weight = members.iter().map(|&i| candidates[i].weight).sum();
            let representative = members
                .iter()
                .copied()
                .max_by(|&a, &b| {
                    candidates[a]
                        .weight
                        .cmp(&candidates[b].weight)
                        // prefer the earlier candidate on equal weight
                        .then(b.cmp(&a))
                })
                .unwrap_or(first_seen);
            let examples = members
                .iter()
                .take(config.max_examples)
                .map(|&i| candidates[i].text.clone())
                .collect();
            (
                first_seen,
                Topic {
                    representative_text: candidates[representative].text.clone(),
                    member_count: members.len(),
                    total_weight,
                    examples,
                },
            )
        })
        .collect();

    topics.sort_by(|(a_first, a), (b_first, b)| {
        b.total_weight
            .cmp(&a.total_weight)
            .then(b.member_count.cmp(&a.member_count))
            .then(a_first.cmp(b_first))
    });

    topics
        .into_iter()
        .take(top_n)
        .map(|(_, topic)| topic)
        .collect()
}
