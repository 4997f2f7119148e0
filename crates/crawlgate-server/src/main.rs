use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crawlgate_client::HttpCrawler;
use crawlgate_core::{BoxCrawler, JobController};
use crawlgate_server::config::{Backend, ServerConfig};
use crawlgate_server::routes;
use crawlgate_server::state::AppState;

/// Crawl requests are tiny JSON objects.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let default_level = std::env::var("CRAWLGATE_LOG_LEVEL").unwrap_or_else(|_| "info".into());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level.to_ascii_lowercase()))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = ServerConfig::from_env()?;
    let crawler = build_crawler(&config).await?;
    let controller = JobController::new(crawler, config.gateway.clone());
    let state = Arc::new(AppState::new(controller));

    let app = routes::router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.bind_addr();
    tracing::info!("Starting crawlgate on {addr}");
    tracing::info!(backend = %config.backend, "Crawl backend ready");
    tracing::info!(
        "Crawl timeout: {}s",
        config.gateway.exec_timeout().as_secs_f64()
    );
    tracing::info!(
        "Max concurrent crawls: {}, Queue timeout: {}s",
        config.gateway.capacity(),
        config.gateway.queue_timeout().as_secs_f64()
    );

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn build_crawler(config: &ServerConfig) -> anyhow::Result<BoxCrawler> {
    match config.backend {
        Backend::Http => Ok(BoxCrawler::new(HttpCrawler::new()?)),
        #[cfg(feature = "browser")]
        Backend::Browser => {
            let settings = crawlgate_client::BrowserSettings {
                headless: config.browser_headless,
                verbose: config.browser_verbose,
            };
            let crawler = crawlgate_client::BrowserCrawler::launch(settings).await?;
            Ok(BoxCrawler::new(crawler))
        }
        #[cfg(not(feature = "browser"))]
        Backend::Browser => {
            anyhow::bail!("CRAWLGATE_BACKEND=browser needs a build with the `browser` feature")
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
