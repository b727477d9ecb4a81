use super::{build_ranked_topics, ClusterStrategy};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::models::{QuestionCandidate, Topic};
use async_trait::async_trait;
use std::collections::HashSet;

/// Deterministic token-overlap clustering. Each candidate is compared to the
/// first member of every existing topic; it joins the most similar topic at or
/// above the threshold, earliest topic on ties, otherwise it starts a new one.
pub struct LexicalStrategy {
    config: AnalysisConfig,
    top_n: usize,
}

impl LexicalStrategy {
    pub fn new(config: AnalysisConfig, top_n: usize) -> Self {
        Self { config, top_n }
    }

    pub fn group(&self, candidates: &[QuestionCandidate]) -> Vec<Vec<usize>> {
        struct Group {
            anchor: HashSet<String>,
            members: Vec<usize>,
        }
        let mut groups: Vec<Group> = Vec::new();
        for (i, candidate) in candidates.iter().enumerate() {
            let tokens = normalize_tokens(&candidate.text, &self.config.stop_words);
            let mut best: Option<(usize, f64)> = None;
            for (gi, group) in groups.iter().enumerate() {
                let similarity = jaccard(&tokens, &group.anchor);
                if similarity >= self.config.similarity_threshold {
                    // Strict > keeps the earliest group on equal similarity.
                    let better = match best {
                        None => true,
                        Some((_, best_sim)) => similarity > best_sim,
                    };
                    if better {
                        best = Some((gi, similarity));
                    }
                }
            }
            match best {
                Some((gi, _)) => groups[gi].members.push(i),
                None => groups.push(Group {
                    anchor: tokens,
                    members: vec![i],
                }),
            }
        }
        groups.into_iter().map(|g| g.members).collect()
    }
}

#[async_trait]
impl ClusterStrategy for LexicalStrategy {
    async fn cluster(&self, candidates: &[QuestionCandidate]) -> Result<Vec<Topic>> {
        let groups = self.group(candidates);
        Ok(build_ranked_topics(
            candidates,
            groups,
            &self.config,
            self.top_n,
        ))
    }
}

// Lowercase, strip punctuation, drop stop-words. An all-stop-word fragment
// yields an empty set and never joins another topic.
pub(crate) fn normalize_tokens(text: &str, stop_words: &[String]) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .filter(|t| !stop_words.iter().any(|sw| sw == t))
        .map(|t| t.to_string())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: &str, weight: u32) -> QuestionCandidate {
        QuestionCandidate {
            source_post_id: "p".to_string(),
            text: text.to_string(),
            weight,
        }
    }

    fn strategy() -> LexicalStrategy {
        LexicalStrategy::new(AnalysisConfig::default(), 20)
    }

    #[tokio::test]
    async fn near_identical_phrasings_form_one_topic_with_summed_weight() {
        // "How do I start keto?" -> {start, keto}; "how do i start a keto diet?"
        // -> {start, keto, diet}; overlap 2 of 3 clears the default threshold.
        let candidates = vec![
            candidate("How do I start keto?", 10),
            candidate("how do i start a keto diet?", 3),
        ];
        let topics = strategy().cluster(&candidates).await.unwrap();

        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].member_count, 2);
        assert_eq!(topics[0].total_weight, 13);
        assert_eq!(topics[0].representative_text, "How do I start keto?");
    }

    #[tokio::test]
    async fn unrelated_questions_stay_separate() {
        let candidates = vec![
            candidate("How do I start keto?", 1),
            candidate("Where can I park near the stadium?", 1),
        ];
        let topics = strategy().cluster(&candidates).await.unwrap();
        assert_eq!(topics.len(), 2);
    }

    #[tokio::test]
    async fn clustering_is_deterministic() {
        let candidates = vec![
            candidate("How do I start keto?", 5),
            candidate("Where to buy keto bread?", 2),
            candidate("how do i start a keto diet?", 3),
            candidate("Anyone knows a good gym?", 1),
        ];
        let first = strategy().cluster(&candidates).await.unwrap();
        let second = strategy().cluster(&candidates).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn equal_weight_ties_rank_in_first_seen_order() {
        let keto = candidate("How do I start keto?", 5);
        let parking = candidate("Where can I park near the stadium?", 5);

        // Same weight, same member count: only the input order decides.
        let forward = strategy()
            .cluster(&[keto.clone(), parking.clone()])
            .await
            .unwrap();
        assert_eq!(forward[0].representative_text, "How do I start keto?");
        assert_eq!(
            forward[1].representative_text,
            "Where can I park near the stadium?"
        );

        let swapped = strategy().cluster(&[parking, keto]).await.unwrap();
        assert_eq!(
            swapped[0].representative_text,
            "Where can I park near the stadium?"
        );
        assert_eq!(swapped[1].representative_text, "How do I start keto?");
    }

    #[tokio::test]
    async fn every_candidate_lands_in_exactly_one_group() {
        let candidates = vec![
            candidate("How do I start keto?", 1),
            candidate("how do i start a keto diet?", 1),
            candidate("Where can I park near the stadium?", 1),
            candidate("czy ktoś wie gdzie kupić opony?", 1),
        ];
        let groups = strategy().group(&candidates);
        let mut seen: Vec<usize> = groups.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn all_stop_word_fragments_become_singletons() {
        let candidates = vec![
            candidate("how do you do it?", 1),
            candidate("how do you do it?", 1),
        ];
        // Both normalize to an empty token set; similarity is defined as 0.
        let groups = strategy().group(&candidates);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn normalize_strips_punctuation_and_stop_words() {
        let tokens = normalize_tokens(
            "How do I start keto?!",
            &AnalysisConfig::default().stop_words,
        );
        let mut sorted: Vec<_> = tokens.into_iter().collect();
        sorted.sort();
        assert_eq!(sorted, vec!["keto", "start"]);
    }

    #[test]
    fn jaccard_basics() {
        let a: HashSet<String> = ["start", "keto"].iter().map(|s| s.to_string()).collect();
        let b: HashSet<String> = ["start", "keto", "diet"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let sim = jaccard(&a, &b);
        assert!((sim - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(jaccard(&a, &HashSet::new()), 0.0);
    }
}
