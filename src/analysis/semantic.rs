use super::{build_ranked_topics, ClusterStrategy, LexicalStrategy};
use crate::config::AnalysisConfig;
use crate::error::{AppError, Result};
use crate::models::{QuestionCandidate, Topic};
use async_trait::async_trait;
use genai::chat::{ChatMessage, ChatRequest};
use genai::Client;
use serde::Deserialize;

/// Delegates grouping to a single language-model call. Any transport, parse,
/// or validation failure is logged and the whole batch is re-clustered with
/// the lexical strategy, so callers always get a usable result.
pub struct SemanticStrategy {
    model: String,
    criteria: String,
    keywords: Vec<String>,
    config: AnalysisConfig,
    top_n: usize,
    fallback: LexicalStrategy,
}

#[derive(Debug, Deserialize)]
struct GroupingResponse {
    topics: Vec<GroupingTopic>,
}

#[derive(Debug, Deserialize)]
struct GroupingTopic {
    #[serde(default)]
    label: String,
    members: Vec<usize>,
}

impl SemanticStrategy {
    pub fn new(
        model: String,
        criteria: String,
        keywords: Vec<String>,
        config: AnalysisConfig,
        top_n: usize,
    ) -> Self {
        let fallback = LexicalStrategy::new(config.clone(), top_n);
        Self {
            model,
            criteria,
            keywords,
            config,
            top_n,
            fallback,
        }
    }

    async fn delegate(&self, candidates: &[QuestionCandidate]) -> Result<Vec<Topic>> {
        let prompt = self.build_prompt(candidates);
        let client = Client::default();
        let request = ChatRequest::new(vec![
            ChatMessage::system(
                "You group user questions into topics. Respond with JSON only, no prose.",
            ),
            ChatMessage::user(prompt),
        ]);
        let response = client
            .exec_chat(&self.model, request, None)
            .await
            .map_err(|e| AppError::ExternalGrouping(format!("Grouping request failed: {}", e)))?;
        let text = response
            .content_text_as_str()
            .ok_or_else(|| AppError::ExternalGrouping("Empty grouping response".to_string()))?;
        self.topics_from_response(candidates, text)
    }

    fn build_prompt(&self, candidates: &[QuestionCandidate]) -> String {
        let mut prompt = String::from(
            "Group the numbered questions below into topics of semantically \
             similar questions. Two questions belong together when they ask \
             about the same underlying problem, even with different wording.\n",
        );
        prompt.push_str(&format!("Grouping focus: {}\n", self.criteria));
        if !self.keywords.is_empty() {
            prompt.push_str(&format!(
                "Pay extra attention to questions mentioning: {}\n",
                self.keywords.join(", ")
            ));
        }
        prompt.push_str(
            "\nRespond with JSON of the shape \
             {\"topics\": [{\"label\": \"...\", \"members\": [0, 2]}]} where \
             members are zero-based question indices. Each index may appear \
             in at most one topic. Leave a question out if it fits nowhere.\n\n",
        );
        for (i, candidate) in candidates.iter().enumerate() {
            prompt.push_str(&format!("{}: {}\n", i, candidate.text));
        }
        prompt
    }

    /// Parses and validates a raw model response into ranked topics.
    /// Unassigned candidates become singleton topics so every candidate is
    /// represented exactly once.
    fn topics_from_response(
        &self,
        candidates: &[QuestionCandidate],
        raw: &str,
    ) -> Result<Vec<Topic>> {
        let json = extract_json(raw);
        let parsed: GroupingResponse = serde_json::from_str(json).map_err(|e| {
            AppError::ExternalGrouping(format!("Unparseable grouping response: {}", e))
        })?;

        let mut assigned = vec![false; candidates.len()];
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for topic in &parsed.topics {
            let mut members = Vec::new();
            for &index in &topic.members {
                if index >= candidates.len() {
                    return Err(AppError::ExternalGrouping(format!(
                        "Grouping index {} out of range for {} candidates",
                        index,
                        candidates.len()
                    )));
                }
                if assigned[index] {
                    return Err(AppError::ExternalGrouping(format!(
                        "Grouping assigned candidate {} twice",
                        index
                    )));
                }
                assigned[index] = true;
                members.push(index);
            }
            if !members.is_empty() {
                tracing::debug!(label = %topic.label, members = members.len(), "semantic group");
                groups.push(members);
            }
        }
        for (index, taken) in assigned.iter().enumerate() {
            if !taken {
                groups.push(vec![index]);
            }
        }
        Ok(build_ranked_topics(candidates, groups, &self.config, self.top_n))
    }

    async fn cluster_with(
        &self,
        candidates: &[QuestionCandidate],
        delegated: Result<Vec<Topic>>,
    ) -> Result<Vec<Topic>> {
        match delegated {
            Ok(topics) => Ok(topics),
            Err(e) => {
                tracing::warn!("Semantic grouping failed, falling back to lexical: {}", e);
                self.fallback.cluster(candidates).await
            }
        }
    }
}

#[async_trait]
impl ClusterStrategy for SemanticStrategy {
    async fn cluster(&self, candidates: &[QuestionCandidate]) -> Result<Vec<Topic>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let delegated = self.delegate(candidates).await;
        self.cluster_with(candidates, delegated).await
    }
}

/// Strips a markdown code fence if the model wrapped its JSON in one.
fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
    {
        if let Some(inner) = rest.rsplit_once("```") {
            return inner.0.trim();
        }
        return rest.trim();
    }
    trimmed
}
