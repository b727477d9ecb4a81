use crate::analysis::{extract_candidates, ClusterStrategy, LexicalStrategy, SemanticStrategy};
use crate::browser::{BrowserDriver, CdpDriver};
use crate::config::RunConfig;
use crate::error::{AppError, Result};
use crate::feed::FeedEngine;
use crate::models::{RunPhase, RunProgress, Topic};
use crate::session::SessionStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Runs a full acquisition + analysis pass and emits a terminal progress
/// event. The browser is closed on every exit path; a cancelled or failed
/// run yields no partial topics.
pub async fn run(
    config: RunConfig,
    progress: mpsc::Sender<RunProgress>,
    cancel: Arc<AtomicBool>,
) -> Result<Vec<Topic>> {
    validate(&config)?;
    let store = SessionStore::open_default()?;

    let mut driver = CdpDriver::launch(config.headless).await?;
    let outcome = run_with_driver(&driver, &config, &store, progress.clone(), cancel).await;
    if let Err(e) = driver.close().await {
        tracing::warn!("Failed to close browser cleanly: {}", e);
    }

    match outcome {
        Ok(topics) => {
            let message = format!("Done: {} topics", topics.len());
            let _ = progress
                .send(RunProgress::finished(topics.clone(), message))
                .await;
            Ok(topics)
        }
        Err(e) => {
            let _ = progress
                .send(RunProgress::status(
                    RunPhase::Failed(e.to_string()),
                    e.to_string(),
                ))
                .await;
            Err(e)
        }
    }
}

/// Driver-generic body of [`run`], split out so engine-to-analysis flow is
/// testable against a scripted driver.
pub async fn run_with_driver<D: BrowserDriver>(
    driver: &D,
    config: &RunConfig,
    store: &SessionStore,
    progress: mpsc::Sender<RunProgress>,
    cancel: Arc<AtomicBool>,
) -> Result<Vec<Topic>> {
    let mut engine = FeedEngine::new(driver, config, store, progress.clone(), cancel.clone());
    engine.acquire().await?;
    let posts = engine.into_posts();

    if cancel.load(Ordering::Relaxed) {
        return Err(AppError::Cancelled);
    }

    let _ = progress
        .send(RunProgress::status(
            RunPhase::Clustering,
            format!("Analyzing {} posts", posts.len()),
        ))
        .await;

    let candidates: Vec<_> = posts
        .iter()
        .flat_map(|post| extract_candidates(post, &config.analysis, &config.keywords))
        .collect();
    tracing::info!(
        posts = posts.len(),
        candidates = candidates.len(),
        "extraction complete"
    );
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    if cancel.load(Ordering::Relaxed) {
        return Err(AppError::Cancelled);
    }

    let strategy: Box<dyn ClusterStrategy> = if config.use_semantic_grouping {
        Box::new(SemanticStrategy::new(
            config.model.clone(),
            config.criteria.clone(),
            config.keywords.clone(),
            config.analysis.clone(),
            config.top_n,
        ))
    } else {
        Box::new(LexicalStrategy::new(config.analysis.clone(), config.top_n))
    };
    strategy.cluster(&candidates).await
}

fn validate(config: &RunConfig) -> Result<()> {
    if config.group_url.trim().is_empty() {
        return Err(AppError::Configuration(
            "A group URL is required".to_string(),
        ));
    }
    if config.max_posts == 0 {
        return Err(AppError::Configuration(
            "max_posts must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::engine_test_support::{temp_session_store, test_config, MockDriver};
    use serde_json::json;

    fn progress_channel() -> (mpsc::Sender<RunProgress>, mpsc::Receiver<RunProgress>) {
        mpsc::channel(64)
    }

    #[tokio::test]
    async fn full_run_produces_ranked_topics_from_scrolled_posts() {
        let driver = MockDriver::new();
        driver.set_url("https://facebook.com/groups/keto");
        driver.mark_present(crate::feed::selectors::AUTH_MARKER);
        driver.push_batch(json!([
            {
                "permalink": "https://facebook.com/groups/keto/posts/1",
                "text": "How do I start keto?",
                "comments": ["how do i start a keto diet?"],
                "reactions": 10.0,
                "timestamp": "2h"
            },
            {
                "permalink": "https://facebook.com/groups/keto/posts/2",
                "text": "Selling winter tires.",
                "comments": [],
                "reactions": 50.0,
                "timestamp": "3h"
            }
        ]));

        let config = test_config(10);
        let store = temp_session_store();
        let (tx, mut rx) = progress_channel();
        let topics = run_with_driver(
            &driver,
            &config,
            &store,
            tx,
            Arc::new(AtomicBool::new(false)),
        )
        .await
        .unwrap();

        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].member_count, 2);
        assert_eq!(topics[0].total_weight, 11);
        assert_eq!(topics[0].representative_text, "How do I start keto?");

        let mut saw_clustering = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event.phase, RunPhase::Clustering) {
                saw_clustering = true;
            }
        }
        assert!(saw_clustering);
    }

    #[tokio::test]
    async fn run_with_no_question_posts_yields_empty_topic_list() {
        let driver = MockDriver::new();
        driver.set_url("https://facebook.com/groups/keto");
        driver.mark_present(crate::feed::selectors::AUTH_MARKER);
        driver.push_batch(json!([
            {
                "permalink": "https://facebook.com/groups/keto/posts/1",
                "text": "Selling winter tires.",
                "comments": [],
                "reactions": 2.0,
                "timestamp": "1h"
            }
        ]));

        let config = test_config(10);
        let store = temp_session_store();
        let (tx, _rx) = progress_channel();
        let topics = run_with_driver(
            &driver,
            &config,
            &store,
            tx,
            Arc::new(AtomicBool::new(false)),
        )
        .await
        .unwrap();
        assert!(topics.is_empty());
    }

    #[test]
    fn validate_rejects_missing_group_url() {
        let config = RunConfig {
            group_url: "  ".to_string(),
            ..RunConfig::default()
        };
        assert!(matches!(
            validate(&config),
            Err(AppError::Configuration(_))
        ));
    }
}
