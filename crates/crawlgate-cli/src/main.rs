mod check;

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crawlgate_client::HttpCrawler;
use crawlgate_core::models::DEFAULT_FILTER_THRESHOLD;
use crawlgate_core::{
    AppError, BoxCrawler, CrawlOptions, CrawlOutput, Crawler, GatewayConfig, JobController,
};

use crate::check::Checker;

#[derive(Parser)]
#[command(name = "crawlgate", version, about = "Crawl web pages into LLM-ready Markdown")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl one page and print its Markdown
    Crawl {
        /// Target URL to crawl
        #[arg(short, long)]
        url: String,

        /// Pruning threshold between 0.0 and 1.0 (lower keeps more)
        #[arg(short, long, default_value_t = DEFAULT_FILTER_THRESHOLD)]
        filter_threshold: f64,

        /// Drop blocks with fewer words than this
        #[arg(short, long, default_value_t = 0)]
        min_word_threshold: usize,

        /// Also print the unfiltered Markdown
        #[arg(long, default_value_t = false)]
        raw: bool,

        /// Crawl backend
        #[arg(short, long, env = "CRAWLGATE_BACKEND", value_enum, default_value_t = BackendArg::Http)]
        backend: BackendArg,

        /// Allow private and loopback targets (HTTP backend only)
        #[arg(long, default_value_t = false)]
        allow_private: bool,

        /// Extra attempts after a busy, slow or network failure
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },

    /// Run smoke checks against a running server
    Check {
        /// Server base URL
        #[arg(short, long, env = "CRAWLGATE_BASE_URL", default_value = "http://localhost:8000")]
        base_url: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Http,
    Browser,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("crawlgate=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            url,
            filter_threshold,
            min_word_threshold,
            raw,
            backend,
            allow_private,
            retries,
        } => {
            let options = CrawlOptions::default()
                .with_filter_threshold(filter_threshold)
                .with_min_word_threshold(min_word_threshold)
                .with_raw(raw);
            cmd_crawl(&url, options, backend, allow_private, retries).await?;
        }
        Commands::Check { base_url } => {
            cmd_check(&base_url).await?;
        }
    }

    Ok(())
}

async fn cmd_crawl(
    url: &str,
    options: CrawlOptions,
    backend: BackendArg,
    allow_private: bool,
    retries: u32,
) -> Result<()> {
    options.validate()?;

    let config = GatewayConfig::from_env().context("Invalid gateway settings")?;
    let crawler = build_crawler(backend, allow_private).await?;
    let controller = JobController::new(crawler, config);

    tracing::info!("Crawling {url}");
    let output = submit_with_retries(&controller, url, &options, retries, RETRY_BACKOFF).await?;

    tracing::info!(
        "Pruned {} bytes of Markdown down to {}",
        output.raw_markdown.len(),
        output.markdown.len()
    );

    println!("{}", output.markdown);
    if options.include_raw {
        println!("\n---\n");
        println!("{}", output.raw_markdown);
    }

    Ok(())
}

/// Pause between attempts, doubled after each retry.
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

async fn submit_with_retries<C: Crawler>(
    controller: &JobController<C>,
    url: &str,
    options: &CrawlOptions,
    retries: u32,
    backoff: Duration,
) -> Result<CrawlOutput, AppError> {
    let mut attempt = 0;
    loop {
        match controller.submit(url, options.clone()).await {
            Err(e) if e.is_retryable() && attempt < retries => {
                let delay = backoff.saturating_mul(2u32.saturating_pow(attempt));
                attempt += 1;
                tracing::warn!(
                    attempt,
                    retries,
                    delay_secs = delay.as_secs_f64(),
                    "Crawl failed ({e}), retrying"
                );
                tokio::time::sleep(delay).await;
            }
            result => return result,
        }
    }
}

async fn build_crawler(backend: BackendArg, allow_private: bool) -> Result<BoxCrawler> {
    match backend {
        BackendArg::Http => {
            let crawler = HttpCrawler::new().context("Failed to create HTTP client")?;
            let crawler = if allow_private {
                crawler.allow_private_urls()
            } else {
                crawler
            };
            Ok(BoxCrawler::new(crawler))
        }
        #[cfg(feature = "browser")]
        BackendArg::Browser => {
            let crawler =
                crawlgate_client::BrowserCrawler::launch(crawlgate_client::BrowserSettings::default())
                    .await?;
            Ok(BoxCrawler::new(crawler))
        }
        #[cfg(not(feature = "browser"))]
        BackendArg::Browser => bail!("the browser backend needs a build with `--features browser`"),
    }
}

async fn cmd_check(base_url: &str) -> Result<()> {
    println!("Running checks against {base_url}\n");

    let checker = Checker::new(base_url)?;
    let outcomes = checker.run_all().await;
    let passed = outcomes.iter().filter(|o| o.passed).count();

    println!("\n{passed}/{} checks passed", outcomes.len());
    if passed != outcomes.len() {
        let failed: Vec<_> = outcomes
            .iter()
            .filter(|o| !o.passed)
            .map(|o| o.name)
            .collect();
        bail!("failed checks: {}", failed.join(", "));
    }

    Ok(())
}
