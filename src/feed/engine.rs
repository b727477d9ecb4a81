use crate::browser::BrowserDriver;
use crate::config::RunConfig;
use crate::error::{AppError, Result};
use crate::models::{RawPost, RunPhase, RunProgress};
use crate::session::SessionStore;
use regex::Regex;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::selectors;

/// One post node as reported by the in-page collection script. Every field
/// is defaulted so a partially-broken node still yields a usable record.
#[derive(Debug, Deserialize)]
pub(crate) struct ExtractedNode {
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub reactions: f64,
    #[serde(default)]
    pub timestamp: String,
}

/// Drives authentication, infinite-scroll pagination, and post extraction
/// against a [`BrowserDriver`]. All mutable run state lives here; nothing is
/// shared across runs.
pub struct FeedEngine<'a, D: BrowserDriver> {
    pub(crate) driver: &'a D,
    pub(crate) config: &'a RunConfig,
    pub(crate) store: &'a SessionStore,
    pub(crate) progress: mpsc::Sender<RunProgress>,
    cancel: Arc<AtomicBool>,
    pub(crate) phase: RunPhase,
    pub(crate) site: String,
    seen: HashSet<String>,
    posts: Vec<RawPost>,
    group_name: Option<String>,
}

impl<'a, D: BrowserDriver> FeedEngine<'a, D> {
    pub fn new(
        driver: &'a D,
        config: &'a RunConfig,
        store: &'a SessionStore,
        progress: mpsc::Sender<RunProgress>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        let site = url::Url::parse(&config.group_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .unwrap_or_else(|| selectors::DEFAULT_SITE.to_string());
        Self {
            driver,
            config,
            store,
            progress,
            cancel,
            phase: RunPhase::Unauthenticated,
            site,
            seen: HashSet::new(),
            posts: Vec::new(),
            group_name: None,
        }
    }

    pub fn posts(&self) -> &[RawPost] {
        &self.posts
    }

    pub fn into_posts(self) -> Vec<RawPost> {
        self.posts
    }

    pub fn group_name(&self) -> Option<&str> {
        self.group_name.as_deref()
    }

    /// Runs the full acquisition: authenticate, then paginate until the
    /// post target, the end of the feed, or the time budget is reached.
    pub async fn acquire(&mut self) -> Result<()> {
        self.check_cancelled()?;
        self.authenticate().await?;
        self.check_cancelled()?;
        self.paginate().await
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub(crate) async fn send_status(&self, message: impl Into<String>) {
        let event = RunProgress::status(self.phase.clone(), message)
            .with_counts(self.posts.len(), self.config.max_posts);
        let _ = self.progress.send(event).await;
    }

    pub(crate) async fn sleep_ms(&self, ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    /// Navigation with bounded retry; exhaustion is fatal for the run.
    pub(crate) async fn navigate_with_retry(&self, url: &str) -> Result<()> {
        let timing = &self.config.timing;
        let mut last = None;
        for attempt in 1..=timing.nav_retries.max(1) {
            match self.driver.navigate(url).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(url, attempt, "Navigation failed: {}", e);
                    last = Some(e);
                    if attempt < timing.nav_retries {
                        self.sleep_ms(timing.nav_retry_backoff_ms * attempt as u64).await;
                    }
                }
            }
        }
        Err(last.unwrap_or_else(|| AppError::Navigation(format!("Failed to reach {}", url))))
    }

    async fn paginate(&mut self) -> Result<()> {
        let timing = self.config.timing.clone();

        self.phase = RunPhase::Scrolling;
        self.send_status(format!("Opening group feed: {}", self.config.group_url))
            .await;
        self.navigate_with_retry(&self.config.group_url).await?;
        self.sleep_ms(timing.settle_wait_ms).await;

        self.dismiss_popups().await;
        self.discover_group_name().await;

        let deadline = Instant::now() + Duration::from_secs(timing.run_budget_secs);
        let mut last_height: i64 = 0;
        let mut stale_rounds: u32 = 0;
        let mut round: u32 = 0;

        while self.posts.len() < self.config.max_posts {
            self.check_cancelled()?;
            if Instant::now() >= deadline {
                tracing::info!("Run time budget exhausted, stopping pagination");
                self.send_status("Time budget reached, stopping early").await;
                break;
            }
            round += 1;

            // Extract before scrolling: the site unmounts older nodes as it
            // virtualizes the feed, so anything visible now may be gone
            // after the next scroll.
            self.phase = RunPhase::Extracting;
            let new_this_round = self.extract_visible_posts().await;
            self.phase = RunPhase::Scrolling;
            self.send_status(format!(
                "Round {}: {} new posts ({}/{})",
                round,
                new_this_round,
                self.posts.len(),
                self.config.max_posts
            ))
            .await;

            if self.posts.len() >= self.config.max_posts {
                break;
            }

            let new_height = match self.driver.scroll_to_bottom().await {
                Ok(h) => h,
                Err(e) => {
                    tracing::warn!("Scroll failed: {}", e);
                    last_height
                }
            };
            self.sleep_ms(timing.scroll_wait_ms).await;

            if new_height <= last_height {
                stale_rounds += 1;
                tracing::debug!(stale_rounds, "No new content after scroll");
                if stale_rounds >= timing.no_new_content_limit {
                    self.send_status("Reached the end of the feed").await;
                    break;
                }
            } else {
                stale_rounds = 0;
            }
            last_height = new_height;

            if round >= timing.max_scroll_rounds {
                self.send_status("Reached the scroll round limit").await;
                break;
            }
        }

        self.send_status(format!(
            "Acquisition finished with {} unique posts",
            self.posts.len()
        ))
        .await;
        Ok(())
    }

    /// Reads all currently-mounted post nodes and appends the unseen ones.
    /// A glitch here is transient: logged and skipped, never fatal.
    async fn extract_visible_posts(&mut self) -> usize {
        let nodes = match self.collect_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::warn!("Post collection glitch, skipping round: {}", e);
                return 0;
            }
        };

        let mut added = 0;
        for node in nodes {
            if self.posts.len() >= self.config.max_posts {
                break;
            }
            let Some(id) = post_identity(&node) else {
                // No text and no permalink: nothing to key the post on.
                continue;
            };
            if !self.seen.insert(id.clone()) {
                continue;
            }
            self.posts.push(RawPost {
                id,
                text: node.text,
                comment_texts: node.comments,
                reaction_count: node.reactions.max(0.0) as u32,
                timestamp_raw: node.timestamp,
            });
            added += 1;
        }
        added
    }

    async fn collect_nodes(&self) -> Result<Vec<ExtractedNode>> {
        let value = self.driver.evaluate(selectors::COLLECT_POSTS_JS).await?;
        // The script returns a JSON string; a scripted driver may hand the
        // array back directly.
        let nodes = match value {
            serde_json::Value::String(raw) => serde_json::from_str(&raw)
                .map_err(|e| AppError::Extraction(format!("Bad node payload: {}", e)))?,
            other => serde_json::from_value(other)
                .map_err(|e| AppError::Extraction(format!("Bad node payload: {}", e)))?,
        };
        Ok(nodes)
    }

    async fn dismiss_popups(&self) {
        for selector in selectors::POPUP_CLOSERS {
            match self.driver.click(selector).await {
                Ok(true) => {
                    tracing::debug!(selector, "Dismissed popup");
                    self.sleep_ms(self.config.timing.settle_wait_ms / 4).await;
                }
                _ => {}
            }
        }
    }

    async fn discover_group_name(&mut self) {
        let mut name = self
            .driver
            .read_attribute(selectors::GROUP_TITLE_META, "content")
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        if name.is_empty() || name.eq_ignore_ascii_case("facebook") {
            name = self
                .driver
                .read_text(selectors::GROUP_TITLE_FALLBACK)
                .await
                .ok()
                .flatten()
                .unwrap_or_default();
        }
        let name = clean_group_name(&name);
        if !name.is_empty() {
            self.send_status(format!("Group: {}", name)).await;
            self.group_name = Some(name);
        }
    }
}

// Identity is the permalink when present, a content hash otherwise.
// Nodes with neither return None.
fn post_identity(node: &ExtractedNode) -> Option<String> {
    if let Some(permalink) = node.permalink.as_deref() {
        if !permalink.is_empty() {
            return Some(permalink.to_string());
        }
    }
    let normalized = normalize_for_hash(&node.text);
    if normalized.is_empty() {
        return None;
    }
    let digest = Sha256::digest(normalized.as_bytes());
    Some(format!("sha256:{}", hex::encode(digest)))
}

fn normalize_for_hash(text: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());
    let spaces = SPACES.get_or_init(|| Regex::new(r"\s+").unwrap());

    let stripped = tags.replace_all(text, "");
    spaces.replace_all(&stripped, " ").trim().to_lowercase()
}

fn clean_group_name(raw: &str) -> String {
    raw.trim()
        .trim_end_matches("| Facebook")
        .trim_start_matches("Facebook -")
        .trim()
        .to_string()
}
