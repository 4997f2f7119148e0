//! Crawl backends for crawlgate.
//!
//! [`HttpCrawler`] fetches raw HTML with reqwest. [`BrowserCrawler`]
//! (feature `browser`) renders pages in headless Chromium first. Both run the
//! HTML through [`HtmdCleaner`] and then [`PruningFilter`].

pub mod cleaner;
pub mod filter;
pub mod http;

#[cfg(feature = "browser")]
pub mod browser;

pub use cleaner::HtmdCleaner;
pub use filter::PruningFilter;
pub use http::HttpCrawler;

#[cfg(feature = "browser")]
pub use browser::{BrowserCrawler, BrowserSettings};
