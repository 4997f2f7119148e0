use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crawlgate_core::CrawlOptions;
use crawlgate_core::models::DEFAULT_FILTER_THRESHOLD;

// ---------------------------------------------------------------------------
// Crawl
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CrawlRequest {
    /// Absolute http(s) URL to crawl.
    pub url: String,
    /// Pruning threshold between 0.0 and 1.0. Lower keeps more content.
    #[schema(default = 0.48, minimum = 0.0, maximum = 1.0)]
    pub filter_threshold: Option<f64>,
    /// Blocks with fewer words are dropped.
    #[schema(default = 0)]
    pub min_word_threshold: Option<usize>,
    /// Also return the unfiltered Markdown.
    #[schema(default = false)]
    pub include_raw_markdown: Option<bool>,
}

impl CrawlRequest {
    pub fn options(&self) -> CrawlOptions {
        CrawlOptions::default()
            .with_filter_threshold(self.filter_threshold.unwrap_or(DEFAULT_FILTER_THRESHOLD))
            .with_min_word_threshold(self.min_word_threshold.unwrap_or(0))
            .with_raw(self.include_raw_markdown.unwrap_or(false))
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CrawlResponse {
    pub success: bool,
    pub url: String,
    /// Markdown after pruning.
    pub markdown: String,
    /// Unfiltered Markdown, only when `include_raw_markdown` was set.
    pub raw_markdown: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CrawlErrorResponse {
    pub success: bool,
    /// The requested URL, empty when the body could not be parsed.
    pub url: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl CrawlErrorResponse {
    pub fn new(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            url: url.into(),
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// Maximum crawls in flight at once.
    pub capacity: usize,
    /// Slots free right now.
    pub available_slots: usize,
}
