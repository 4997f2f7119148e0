/// Smoke-test for `BrowserCrawler`.
///
/// Launches headless Chromium, crawls <https://example.com> and checks the
/// pruned Markdown still has the page's heading and prose.
///
/// Run with:
///   cargo run -p crawlgate-client --example browser_smoke --features browser
use crawlgate_client::{BrowserCrawler, BrowserSettings};
use crawlgate_core::{CrawlOptions, Crawler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    println!("Launching headless browser...");
    let crawler = BrowserCrawler::launch(BrowserSettings::default()).await?;

    let url = "https://example.com";
    println!("Crawling {url} ...");
    let output = crawler
        .crawl(url, &CrawlOptions::default().with_raw(true))
        .await?;

    assert!(
        output.markdown.contains("Example Domain"),
        "Expected heading not found in Markdown"
    );
    assert!(
        output.raw_markdown.len() >= output.markdown.len(),
        "Filtered Markdown is longer than the raw Markdown"
    );

    println!(
        "OK: {} bytes filtered, {} bytes raw",
        output.markdown.len(),
        output.raw_markdown.len()
    );
    println!("{}", output.markdown);
    Ok(())
}
