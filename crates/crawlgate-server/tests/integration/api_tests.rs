use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use crawlgate_core::AppError;
use crawlgate_core::testutil::MockCrawler;

use crate::integration::common::{
    PAGE_MARKDOWN, post_crawl, send, setup_default_app, setup_test_app,
};

const URL: &str = "https://www.example.com/";

#[tokio::test]
async fn health_returns_ok_with_gate_state() {
    let app = setup_default_app();

    let response = send(
        app.router,
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["status"], "ok");
    assert_eq!(response.json["capacity"], 3);
    assert_eq!(response.json["available_slots"], 3);
}

#[tokio::test]
async fn crawl_returns_markdown() {
    let app = setup_default_app();

    let response = post_crawl(app.router, json!({ "url": URL })).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["success"], true);
    assert_eq!(response.json["url"], URL);
    assert_eq!(response.json["markdown"], PAGE_MARKDOWN);
    assert!(response.json["raw_markdown"].is_null());
    assert!(response.json["timestamp"].is_string());
    assert_eq!(app.crawler.calls(), vec![URL.to_string()]);
}

#[tokio::test]
async fn include_raw_markdown_returns_both_versions() {
    let app = setup_default_app();

    let response = post_crawl(
        app.router,
        json!({ "url": URL, "include_raw_markdown": true }),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let raw = response.json["raw_markdown"].as_str().unwrap();
    assert!(raw.starts_with(PAGE_MARKDOWN));
    assert_ne!(raw, response.json["markdown"].as_str().unwrap());
}

#[tokio::test]
async fn custom_thresholds_are_accepted() {
    let app = setup_default_app();

    let response = post_crawl(
        app.router,
        json!({ "url": URL, "filter_threshold": 0.1, "min_word_threshold": 1 }),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["success"], true);
}

#[tokio::test]
async fn invalid_url_returns_400_without_crawling() {
    let app = setup_default_app();

    for url in ["not-a-valid-url", "ftp://example.com/file", ""] {
        let response = post_crawl(app.router.clone(), json!({ "url": url })).await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{url}");
        assert_eq!(response.json["success"], false);
        assert_eq!(response.json["url"], url);
        assert!(
            response.json["error"]
                .as_str()
                .unwrap()
                .starts_with("Invalid request:")
        );
    }

    assert!(app.crawler.calls().is_empty());
    assert_eq!(app.state.controller.available_slots(), 3);
}

#[tokio::test]
async fn out_of_range_threshold_returns_400() {
    let app = setup_default_app();

    let response = post_crawl(app.router, json!({ "url": URL, "filter_threshold": 1.5 })).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(
        response.json["error"]
            .as_str()
            .unwrap()
            .contains("filter_threshold")
    );
    assert!(app.crawler.calls().is_empty());
}

#[tokio::test]
async fn malformed_body_returns_400() {
    let app = setup_default_app();

    let request = Request::post("/crawl")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = send(app.router.clone(), request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json["success"], false);
    assert_eq!(response.json["url"], "");

    let response = post_crawl(app.router, json!({ "filter_threshold": 0.5 })).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn backend_failure_returns_502_and_releases_slot() {
    let crawler = MockCrawler::with_responses(vec![
        Err(AppError::CrawlFailed(format!("HTTP 404 for {URL}"))),
        Ok("# Recovered".to_string()),
    ]);
    let app = setup_test_app(crawler, 1, Duration::from_secs(5), Duration::from_secs(5));

    let response = post_crawl(app.router.clone(), json!({ "url": URL })).await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.json["success"], false);
    assert!(
        response.json["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to crawl URL:")
    );
    assert_eq!(app.state.controller.available_slots(), 1);

    let response = post_crawl(app.router, json!({ "url": URL })).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["markdown"], "# Recovered");
}

#[tokio::test]
async fn backend_panic_returns_502_and_releases_slot() {
    let crawler = MockCrawler::new(PAGE_MARKDOWN).panic_on_next("renderer crashed");
    let app = setup_test_app(crawler, 1, Duration::from_secs(5), Duration::from_secs(5));

    let response = post_crawl(app.router.clone(), json!({ "url": URL })).await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert!(
        response.json["error"]
            .as_str()
            .unwrap()
            .contains("renderer crashed")
    );
    assert_eq!(app.state.controller.available_slots(), 1);

    let response = post_crawl(app.router, json!({ "url": URL })).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn queue_timeout_returns_503_with_retry_after() {
    let crawler = MockCrawler::new(PAGE_MARKDOWN).with_delay(Duration::from_secs(10));
    let app = setup_test_app(crawler, 1, Duration::from_secs(2), Duration::from_secs(30));

    let slow = tokio::spawn(post_crawl(
        app.router.clone(),
        json!({ "url": "https://example.com/slow" }),
    ));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let busy = post_crawl(
        app.router.clone(),
        json!({ "url": "https://example.com/waiting" }),
    )
    .await;

    assert_eq!(busy.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(busy.headers["retry-after"], "60");
    assert_eq!(busy.json["success"], false);
    assert!(
        busy.json["error"]
            .as_str()
            .unwrap()
            .contains("Service too busy")
    );

    let slow = slow.await.unwrap();
    assert_eq!(slow.status, StatusCode::OK);
    assert_eq!(
        app.crawler.calls(),
        vec!["https://example.com/slow".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn execution_timeout_returns_504_and_releases_slot() {
    let crawler = MockCrawler::new(PAGE_MARKDOWN).with_delays(vec![Duration::from_secs(10)]);
    let app = setup_test_app(crawler, 1, Duration::from_secs(5), Duration::from_secs(1));

    let response = post_crawl(app.router.clone(), json!({ "url": URL })).await;

    assert_eq!(response.status, StatusCode::GATEWAY_TIMEOUT);
    assert!(response.headers.get("retry-after").is_none());
    assert!(
        response.json["error"]
            .as_str()
            .unwrap()
            .contains("timed out")
    );
    assert_eq!(app.state.controller.available_slots(), 1);
    assert_eq!(app.crawler.in_flight(), 0);

    let response = post_crawl(app.router, json!({ "url": URL })).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_are_bounded_by_capacity() {
    let crawler = MockCrawler::new(PAGE_MARKDOWN).with_delay(Duration::from_secs(1));
    let app = setup_test_app(crawler, 2, Duration::from_secs(30), Duration::from_secs(30));

    let handles: Vec<_> = (0..6)
        .map(|i| {
            tokio::spawn(post_crawl(
                app.router.clone(),
                json!({ "url": format!("https://example.com/{i}") }),
            ))
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
    }

    assert_eq!(app.crawler.calls().len(), 6);
    assert_eq!(app.crawler.max_in_flight(), 2);
    assert_eq!(app.state.controller.available_slots(), 2);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_default_app();

    let response = send(
        app.router,
        Request::get("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.json["paths"]["/crawl"].is_object());
}
