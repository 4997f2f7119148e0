use std::time::Duration;

use thiserror::Error;

/// Application-wide error types for crawlgate.
#[derive(Error, Debug)]
pub enum AppError {
    /// No concurrency slot became free within the queue timeout.
    #[error("Service too busy: no crawl slot available after {} seconds", .0.as_secs_f64())]
    QueueTimeout(Duration),

    /// An admitted crawl did not finish within the execution timeout.
    #[error("Crawl operation timed out after {} seconds", .0.as_secs_f64())]
    ExecutionTimeout(Duration),

    /// The backend completed but reported an unsuccessful result.
    #[error("Crawl failed: {0}")]
    CrawlFailed(String),

    /// HTTP request failed (fetching a page).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Headless browser could not be driven.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// HTML-to-Markdown conversion failed.
    #[error("Cleaner error: {0}")]
    CleanerError(String),

    /// The backend panicked mid-crawl.
    #[error("Crawler panicked: {0}")]
    BackendPanic(String),

    /// The target URL was rejected before any work was queued.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request options are out of range.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

/// Caller-visible classification of a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Every slot stayed busy for the whole queue timeout. Retry later.
    Overloaded,
    /// The crawl was admitted but exceeded its time budget.
    UpstreamSlow,
    /// The backend reported an error or crashed.
    UpstreamError,
    /// The request never reached the controller.
    Rejected,
}

impl AppError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AppError::QueueTimeout(_) => FailureKind::Overloaded,
            AppError::ExecutionTimeout(_) => FailureKind::UpstreamSlow,
            AppError::InvalidUrl(_) | AppError::InvalidOptions(_) | AppError::ConfigError(_) => {
                FailureKind::Rejected
            }
            AppError::CrawlFailed(_)
            | AppError::HttpError(_)
            | AppError::NetworkError(_)
            | AppError::BrowserError(_)
            | AppError::CleanerError(_)
            | AppError::BackendPanic(_)
            | AppError::Generic(_) => FailureKind::UpstreamError,
        }
    }

    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::QueueTimeout(_) | AppError::ExecutionTimeout(_) | AppError::NetworkError(_)
        )
    }
}
