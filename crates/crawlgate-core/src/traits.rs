use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::AppError;
use crate::models::{CrawlOptions, CrawlOutput};

/// Fetches a page and turns it into filtered Markdown.
///
/// Implementations are opaque to the controller: they may take arbitrarily
/// long and offer no cancellation hook beyond being dropped.
pub trait Crawler: Send + Sync + Clone {
    fn crawl(
        &self,
        url: &str,
        options: &CrawlOptions,
    ) -> impl Future<Output = Result<CrawlOutput, AppError>> + Send;
}

/// Object-safe mirror of [`Crawler`], used by [`BoxCrawler`].
trait DynCrawler: Send + Sync {
    fn crawl_boxed<'a>(
        &'a self,
        url: &'a str,
        options: &'a CrawlOptions,
    ) -> BoxFuture<'a, Result<CrawlOutput, AppError>>;
}

impl<C: Crawler + 'static> DynCrawler for C {
    fn crawl_boxed<'a>(
        &'a self,
        url: &'a str,
        options: &'a CrawlOptions,
    ) -> BoxFuture<'a, Result<CrawlOutput, AppError>> {
        Box::pin(self.crawl(url, options))
    }
}

/// Type-erased crawler, so callers can pick a backend at runtime without
/// making their own types generic.
#[derive(Clone)]
pub struct BoxCrawler {
    inner: Arc<dyn DynCrawler>,
}

impl BoxCrawler {
    pub fn new<C: Crawler + 'static>(crawler: C) -> Self {
        Self {
            inner: Arc::new(crawler),
        }
    }
}

impl fmt::Debug for BoxCrawler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxCrawler").finish_non_exhaustive()
    }
}

impl Crawler for BoxCrawler {
    async fn crawl(&self, url: &str, options: &CrawlOptions) -> Result<CrawlOutput, AppError> {
        self.inner.crawl_boxed(url, options).await
    }
}
