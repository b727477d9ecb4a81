use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_CRITERIA: &str = "what people struggle with the most, what help they are \
     looking for, what problems they run into day to day";

/// Everything one run needs, passed explicitly through the pipeline.
/// Credentials are never written to disk.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub group_url: String,
    pub email: String,
    pub password: String,
    pub max_posts: usize,
    pub top_n: usize,
    pub criteria: String,
    pub keywords: Vec<String>,
    pub use_semantic_grouping: bool,
    pub headless: bool,
    pub restore_session: bool,
    pub save_session: bool,
    pub model: String,
    pub timing: TimingConfig,
    pub analysis: AnalysisConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            group_url: String::new(),
            email: std::env::var("FEEDSIFT_EMAIL").unwrap_or_default(),
            password: std::env::var("FEEDSIFT_PASSWORD").unwrap_or_default(),
            max_posts: 100,
            top_n: 20,
            criteria: DEFAULT_CRITERIA.to_string(),
            keywords: Vec::new(),
            use_semantic_grouping: false,
            headless: true,
            restore_session: true,
            save_session: true,
            model: std::env::var("FEEDSIFT_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            timing: TimingConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

/// Waits and retry bounds for the acquisition loop. Tests collapse these to
/// near-zero so engine tests run without real delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    pub scroll_wait_ms: u64,
    pub settle_wait_ms: u64,
    pub login_poll_ms: u64,
    pub login_poll_rounds: u32,
    pub verification_timeout_ms: u64,
    pub nav_retries: u32,
    pub nav_retry_backoff_ms: u64,
    pub no_new_content_limit: u32,
    pub max_scroll_rounds: u32,
    pub run_budget_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            scroll_wait_ms: 1500,
            settle_wait_ms: 2000,
            login_poll_ms: 1000,
            login_poll_rounds: 15,
            verification_timeout_ms: 180_000,
            nav_retries: 3,
            nav_retry_backoff_ms: 2000,
            no_new_content_limit: 5,
            max_scroll_rounds: 100,
            run_budget_secs: 900,
        }
    }
}

/// Tunables for question detection and lexical clustering. The threshold and
/// word lists are empirical; scenario tests pin behavior, not exact values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub min_fragment_tokens: usize,
    pub comment_base_weight: u32,
    pub similarity_threshold: f64,
    pub max_examples: usize,
    pub interrogative_cues: Vec<String>,
    pub stop_words: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_fragment_tokens: 3,
            comment_base_weight: 1,
            similarity_threshold: 0.5,
            max_examples: 5,
            interrogative_cues: default_word_list(&[
                // English
                "how", "what", "why", "where", "when", "who", "which", "does",
                "do", "is", "are", "can", "could", "should", "would", "anyone",
                // Polish
                "czy", "jak", "co", "gdzie", "kiedy", "dlaczego", "kto",
                "ile", "skad", "skąd", "czemu", "ktore", "które",
            ]),
            stop_words: default_word_list(&[
                // English
                "a", "an", "the", "i", "to", "do", "does", "is", "are", "how",
                "what", "my", "me", "you", "it", "of", "in", "on", "for",
                "with", "and", "or", "there", "any", "anyone",
                // Polish
                "czy", "jak", "co", "to", "sie", "się", "na", "w", "z", "o",
                "do", "i", "jest", "mam", "mi", "ktos", "ktoś", "wie",
            ]),
        }
    }
}

fn default_word_list(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// Split the operator's free-text keyword field into trimmed, non-empty terms.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|kw| kw.trim().to_string())
        .filter(|kw| !kw.is_empty())
        .collect()
}

/// Non-secret knobs persisted between runs so the operator does not retype
/// them. Missing keys fall back to defaults; unknown keys are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub group_url: String,
    pub email: String,
    pub max_posts: usize,
    pub top_n: usize,
    pub criteria: String,
    pub keywords: String,
    pub use_semantic_grouping: bool,
    pub headless: bool,
    pub restore_session: bool,
    pub save_session: bool,
    pub model: String,
}

impl Default for Settings {
    fn default() -> Self {
        let run = RunConfig::default();
        Self {
            group_url: run.group_url,
            email: run.email,
            max_posts: run.max_posts,
            top_n: run.top_n,
            criteria: run.criteria,
            keywords: String::new(),
            use_semantic_grouping: run.use_semantic_grouping,
            headless: run.headless,
            restore_session: run.restore_session,
            save_session: run.save_session,
            model: run.model,
        }
    }
}

impl Settings {
    pub fn load(path: &PathBuf) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::Storage(format!("Failed to create settings dir: {}", e)))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .map_err(|e| AppError::Storage(format!("Failed to write settings: {}", e)))?;
        Ok(())
    }

    pub fn into_run_config(self, password: String) -> RunConfig {
        RunConfig {
            group_url: self.group_url,
            email: self.email,
            password,
            max_posts: self.max_posts,
            top_n: self.top_n,
            criteria: self.criteria,
            keywords: parse_keywords(&self.keywords),
            use_semantic_grouping: self.use_semantic_grouping,
            headless: self.headless,
            restore_session: self.restore_session,
            save_session: self.save_session,
            model: self.model,
            timing: TimingConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

/// Application data directory (settings, saved sessions).
pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .ok_or_else(|| AppError::Storage("Could not find data directory".to_string()))?
        .join("feedsift");
    Ok(base)
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("settings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keywords_trims_and_drops_empty() {
        let parsed = parse_keywords("keto, diet , ,  insulin resistance,");
        assert_eq!(parsed, vec!["keto", "diet", "insulin resistance"]);
    }

    #[test]
    fn parse_keywords_empty_input() {
        assert!(parse_keywords("").is_empty());
        assert!(parse_keywords("  ,  ,").is_empty());
    }

    #[test]
    fn settings_partial_json_falls_back_to_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"group_url": "https://example.com/groups/keto"}"#).unwrap();
        assert_eq!(settings.group_url, "https://example.com/groups/keto");
        assert_eq!(settings.max_posts, 100);
        assert!(settings.headless);
    }

    #[test]
    fn settings_unknown_keys_ignored() {
        let settings: Settings =
            serde_json::from_str(r#"{"top_n": 7, "gemini_api_key": "never-stored"}"#).unwrap();
        assert_eq!(settings.top_n, 7);
    }
}
