use serde::{Deserialize, Serialize};

use crate::models::Topic;

/// Acquisition-engine phases. `Failed` is the absorbing error state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunPhase {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Scrolling,
    Extracting,
    Clustering,
    Done,
    Failed(String),
}

/// One entry in the append-only progress stream consumed by the UI/CLI.
/// The terminal event carries the ranked topic list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgress {
    pub phase: RunPhase,
    pub message: String,
    pub posts_collected: usize,
    pub posts_target: usize,
    pub result: Option<Vec<Topic>>,
}

impl RunProgress {
    pub fn status(phase: RunPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            posts_collected: 0,
            posts_target: 0,
            result: None,
        }
    }

    pub fn with_counts(mut self, collected: usize, target: usize) -> Self {
        self.posts_collected = collected;
        self.posts_target = target;
        self
    }

    pub fn finished(topics: Vec<Topic>, message: impl Into<String>) -> Self {
        Self {
            phase: RunPhase::Done,
            message: message.into(),
            posts_collected: 0,
            posts_target: 0,
            result: Some(topics),
        }
    }
}
