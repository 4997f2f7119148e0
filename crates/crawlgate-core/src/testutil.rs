//! Test utilities: mock crawler and recording reporter.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::controller::{JobEvent, JobReporter};
use crate::error::AppError;
use crate::models::{CrawlOptions, CrawlOutput};
use crate::traits::Crawler;

// ---------------------------------------------------------------------------
// MockCrawler
// ---------------------------------------------------------------------------

/// Mock crawler with scripted responses, delays and panics.
///
/// Tracks how many calls are in flight at once so tests can assert on the
/// concurrency bound.
#[derive(Clone)]
pub struct MockCrawler {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns `default_markdown`.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    default_markdown: String,
    /// Per-call delays, consumed in order. Falls back to `delay`.
    delays: Arc<Mutex<Vec<Duration>>>,
    delay: Duration,
    panic_message: Arc<Mutex<Option<String>>>,
    calls: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockCrawler {
    pub fn new(markdown: &str) -> Self {
        Self::build(Vec::new(), markdown)
    }

    pub fn with_error(error: AppError) -> Self {
        Self::build(vec![Err(error)], "default")
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self::build(responses, "default")
    }

    fn build(responses: Vec<Result<String, AppError>>, markdown: &str) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            default_markdown: markdown.to_string(),
            delays: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
            panic_message: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Calls sleep for these delays in order, then fall back to the fixed delay.
    pub fn with_delays(self, delays: Vec<Duration>) -> Self {
        *self.delays.lock().unwrap() = delays;
        self
    }

    /// The next call panics with `message` after its delay.
    pub fn panic_on_next(self, message: &str) -> Self {
        *self.panic_message.lock().unwrap() = Some(message.to_string());
        self
    }

    /// URLs requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter when the crawl future ends or is dropped.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Crawler for MockCrawler {
    async fn crawl(&self, url: &str, options: &CrawlOptions) -> Result<CrawlOutput, AppError> {
        self.calls.lock().unwrap().push(url.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(self.in_flight.clone());

        let delay = {
            let mut delays = self.delays.lock().unwrap();
            if delays.is_empty() {
                self.delay
            } else {
                delays.remove(0)
            }
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let panic_message = self.panic_message.lock().unwrap().take();
        if let Some(message) = panic_message {
            panic!("{message}");
        }

        let response = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(self.default_markdown.clone())
            } else {
                responses.remove(0)
            }
        };

        response.map(|markdown| CrawlOutput {
            raw_markdown: if options.include_raw {
                format!("{markdown}\n\n[raw]")
            } else {
                markdown.clone()
            },
            markdown,
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Mock job reporter that records event names.
#[derive(Default)]
pub struct RecordingReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobReporter for RecordingReporter {
    fn report(&self, event: JobEvent<'_>) {
        let label = match &event {
            JobEvent::Queued { .. } => "Queued",
            JobEvent::Admitted { .. } => "Admitted",
            JobEvent::Completed { .. } => "Completed",
            JobEvent::QueueTimedOut { .. } => "QueueTimedOut",
            JobEvent::ExecutionTimedOut { .. } => "ExecutionTimedOut",
            JobEvent::Failed { .. } => "Failed",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}
