use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use chrono::Utc;
use url::Url;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crawlgate_core::AppError;

use crate::dto::{CrawlErrorResponse, CrawlRequest, CrawlResponse, HealthResponse};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/crawl", post(crawl))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Crawl
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/crawl",
    request_body = CrawlRequest,
    responses(
        (status = 200, description = "Filtered Markdown for the page", body = CrawlResponse),
        (status = 400, description = "Invalid URL or options", body = CrawlErrorResponse),
        (status = 502, description = "The crawl failed", body = CrawlErrorResponse),
        (status = 503, description = "No crawl slot freed up in time, retry later", body = CrawlErrorResponse,
            headers(("Retry-After" = u64, description = "Seconds to wait before retrying"))),
        (status = 504, description = "The crawl exceeded its time budget", body = CrawlErrorResponse),
    ),
    tag = "crawl"
)]
pub async fn crawl(
    State(state): State<Arc<AppState>>,
    body: Result<axum::Json<CrawlRequest>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(axum::Json(body)) => body,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Rejected crawl request body");
            let error = CrawlErrorResponse::new(
                "",
                format!("Invalid request: {}", rejection.body_text()),
            );
            return (StatusCode::BAD_REQUEST, axum::Json(error)).into_response();
        }
    };

    let options = body.options();
    tracing::info!(
        url = %body.url,
        filter_threshold = options.filter_threshold,
        min_word_threshold = options.min_word_threshold,
        "Received crawl request"
    );

    if let Err(e) = validate_target(&body.url).and_then(|_| options.validate()) {
        return ApiError::new(body.url, e).into_response();
    }

    match state.controller.submit(&body.url, options.clone()).await {
        Ok(output) => {
            let response = CrawlResponse {
                success: true,
                markdown: output.markdown,
                raw_markdown: options.include_raw.then_some(output.raw_markdown),
                url: body.url,
                timestamp: Utc::now(),
            };
            axum::Json(response).into_response()
        }
        Err(e) => ApiError::new(body.url, e).into_response(),
    }
}

/// Accept only absolute http(s) URLs with a host.
fn validate_target(raw: &str) -> Result<(), AppError> {
    let url = Url::parse(raw).map_err(|e| AppError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::InvalidUrl(format!(
                "URL scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(AppError::InvalidUrl(format!("{raw}: URL has no host")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "ok".to_string(),
        capacity: state.controller.capacity(),
        available_slots: state.controller.available_slots(),
    })
}
