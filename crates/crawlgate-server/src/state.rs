use crawlgate_core::{BoxCrawler, JobController};

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    /// The only path to the crawl backend. Every request goes through its gate.
    pub controller: JobController<BoxCrawler>,
}

impl AppState {
    pub fn new(controller: JobController<BoxCrawler>) -> Self {
        Self { controller }
    }
}
