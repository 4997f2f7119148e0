use std::path::PathBuf;
use std::sync::Arc;

use chromiumoxide::{Browser, BrowserConfig, Page};
use crawlgate_core::{AppError, CrawlOptions, CrawlOutput, Crawler};
use futures::StreamExt;

use crate::cleaner::HtmdCleaner;

/// Launch flags for [`BrowserCrawler`].
#[derive(Debug, Clone, Copy)]
pub struct BrowserSettings {
    pub headless: bool,
    /// Forward Chromium's own logging to stderr and log every CDP handler error.
    pub verbose: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            verbose: false,
        }
    }
}

/// Headless-browser crawler using Chromium via the Chrome DevTools Protocol.
///
/// Renders JavaScript before converting, so SPAs and lazy-loaded pages come
/// back with their real content.
///
/// One Chromium process is shared across all clones. Each crawl opens its
/// own tab and the tab is closed when the crawl finishes or is abandoned by
/// the execution deadline.
///
/// # Example
///
/// ```rust,no_run
/// use crawlgate_client::{BrowserCrawler, BrowserSettings};
/// use crawlgate_core::{CrawlOptions, Crawler};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let crawler = BrowserCrawler::launch(BrowserSettings::default()).await?;
/// let output = crawler.crawl("https://example.com", &CrawlOptions::default()).await?;
/// println!("{}", output.markdown);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BrowserCrawler {
    browser: Arc<Browser>,
    cleaner: HtmdCleaner,
}

impl BrowserCrawler {
    /// Launch Chromium once. Requires a Chrome/Chromium binary on `$PATH`,
    /// in a well-known location, or named by `CHROME_BIN`.
    pub async fn launch(settings: BrowserSettings) -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder().no_sandbox().disable_default_args();

        // Snap-packaged Chromium ships a wrapper that rejects standard flags,
        // so prefer the real binary when we can find one.
        if let Some(bin) = find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        if settings.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        if settings.verbose {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let config = builder
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-translate")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let verbose = settings.verbose;
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    if verbose {
                        tracing::debug!(error = %e, "CDP handler event error");
                        continue;
                    }
                    tracing::warn!(error = %e, "Browser CDP handler stopped");
                    break;
                }
            }
        });

        tracing::info!(headless = settings.headless, "Browser launched");

        Ok(Self {
            browser: Arc::new(browser),
            cleaner: HtmdCleaner::new(),
        })
    }

    async fn render_page(&self, url: &str) -> Result<String, AppError> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| AppError::CrawlFailed(format!("Failed to navigate to {url}: {e}")))?;
        let tab = TabGuard(page);
        let page = &tab.0;

        page.find_element("body")
            .await
            .map_err(|e| AppError::CrawlFailed(format!("Page did not render body: {e}")))?;

        page.content()
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to read page content: {e}")))
    }
}

impl Crawler for BrowserCrawler {
    async fn crawl(&self, url: &str, options: &CrawlOptions) -> Result<CrawlOutput, AppError> {
        let html = self.render_page(url).await?;
        tracing::debug!(url, html_len = html.len(), "Rendered page");
        self.cleaner.render(&html, options)
    }
}

/// Closes the tab on every exit path, including the crawl future being
/// dropped at the deadline.
struct TabGuard(Page);

impl Drop for TabGuard {
    fn drop(&mut self) {
        let page = self.0.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = page.close().await {
                    tracing::debug!(error = %e, "Failed to close tab");
                }
            });
        }
    }
}

/// Locate the real Chrome/Chromium binary.
///
/// `CHROME_BIN` wins when it points at an existing file. Otherwise the snap
/// internals are tried first, then the usual system paths. `None` lets
/// chromiumoxide do its own lookup.
fn find_chrome_binary() -> Option<PathBuf> {
    const CANDIDATES: &[&str] = &[
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    CANDIDATES.iter().map(PathBuf::from).find(|p| p.exists())
}
