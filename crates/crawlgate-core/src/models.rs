use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Default pruning threshold for the content filter.
pub const DEFAULT_FILTER_THRESHOLD: f64 = 0.48;

/// Per-request knobs passed through to the crawler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlOptions {
    /// Minimum block score (0.0 - 1.0) for content to survive pruning.
    /// Lower keeps more content.
    pub filter_threshold: f64,
    /// Blocks with fewer words than this are dropped.
    pub min_word_threshold: usize,
    /// Also return the unfiltered Markdown.
    pub include_raw: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            filter_threshold: DEFAULT_FILTER_THRESHOLD,
            min_word_threshold: 0,
            include_raw: false,
        }
    }
}

impl CrawlOptions {
    pub fn with_filter_threshold(mut self, threshold: f64) -> Self {
        self.filter_threshold = threshold;
        self
    }

    pub fn with_min_word_threshold(mut self, words: usize) -> Self {
        self.min_word_threshold = words;
        self
    }

    pub fn with_raw(mut self, include_raw: bool) -> Self {
        self.include_raw = include_raw;
        self
    }

    /// Rejects thresholds outside `[0, 1]` (NaN included).
    pub fn validate(&self) -> Result<(), AppError> {
        if !(0.0..=1.0).contains(&self.filter_threshold) {
            return Err(AppError::InvalidOptions(format!(
                "filter_threshold must be between 0.0 and 1.0, got {}",
                self.filter_threshold
            )));
        }
        Ok(())
    }
}

/// Content produced by a successful crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlOutput {
    /// Markdown after the pruning filter.
    pub markdown: String,
    /// Markdown before filtering.
    pub raw_markdown: String,
}

/// Lifecycle of a job inside the controller.
///
/// ```text
/// Queued --> Admitted --> Executing --> Completed | ExecutionTimedOut | Failed
///    |
///    +--> QueueTimedOut
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Admitted,
    Executing,
    Completed,
    ExecutionTimedOut,
    Failed,
    QueueTimedOut,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Admitted => "admitted",
            JobState::Executing => "executing",
            JobState::Completed => "completed",
            JobState::ExecutionTimedOut => "execution_timed_out",
            JobState::Failed => "failed",
            JobState::QueueTimedOut => "queue_timed_out",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed
                | JobState::ExecutionTimedOut
                | JobState::Failed
                | JobState::QueueTimedOut
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One request's trip through the controller. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub url: String,
    pub options: CrawlOptions,
    pub state: JobState,
    pub enqueued_at: DateTime<Utc>,
    pub admitted_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(url: impl Into<String>, options: CrawlOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            options,
            state: JobState::Queued,
            enqueued_at: Utc::now(),
            admitted_at: None,
            finished_at: None,
        }
    }

    pub(crate) fn admit(&mut self) {
        self.state = JobState::Admitted;
        self.admitted_at = Some(Utc::now());
    }

    pub(crate) fn finish(&mut self, state: JobState) {
        debug_assert!(state.is_terminal());
        self.state = state;
        self.finished_at = Some(Utc::now());
    }
}
