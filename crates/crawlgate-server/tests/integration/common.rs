use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crawlgate_core::testutil::MockCrawler;
use crawlgate_core::{BoxCrawler, GatewayConfig, JobController};
use crawlgate_server::routes;
use crawlgate_server::state::AppState;

pub const PAGE_MARKDOWN: &str = "# Example Domain\n\nThis domain is for use in illustrative examples.";

pub struct TestApp {
    pub router: Router,
    pub crawler: MockCrawler,
    pub state: Arc<AppState>,
}

/// Router backed by `crawler`, with the given gate settings.
pub fn setup_test_app(
    crawler: MockCrawler,
    capacity: i64,
    queue_timeout: Duration,
    exec_timeout: Duration,
) -> TestApp {
    let config = GatewayConfig::new(capacity, queue_timeout, exec_timeout);
    let controller = JobController::new(BoxCrawler::new(crawler.clone()), config);
    let state = Arc::new(AppState::new(controller));

    TestApp {
        router: routes::router(state.clone()),
        crawler,
        state,
    }
}

/// Default gate (3 slots, 30 s / 30 s) over a crawler that always succeeds.
pub fn setup_default_app() -> TestApp {
    setup_test_app(
        MockCrawler::new(PAGE_MARKDOWN),
        3,
        Duration::from_secs(30),
        Duration::from_secs(30),
    )
}

pub struct JsonResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: serde_json::Value,
}

pub async fn send(router: Router, request: Request<Body>) -> JsonResponse {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);

    JsonResponse {
        status,
        headers,
        json,
    }
}

pub async fn post_crawl(router: Router, body: serde_json::Value) -> JsonResponse {
    let request = Request::post("/crawl")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    send(router, request).await
}
