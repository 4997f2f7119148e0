use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crawlgate_core::{AppError, FailureKind};

use crate::dto::CrawlErrorResponse;

/// Seconds a client should back off after an overloaded response.
pub const RETRY_AFTER_SECS: u64 = 60;

/// A failed crawl request: the URL it was for plus the reason.
pub struct ApiError {
    pub url: String,
    pub error: AppError,
}

impl ApiError {
    pub fn new(url: impl Into<String>, error: AppError) -> Self {
        Self {
            url: url.into(),
            error,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.error.kind() {
            FailureKind::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
            FailureKind::UpstreamSlow => StatusCode::GATEWAY_TIMEOUT,
            FailureKind::UpstreamError => StatusCode::BAD_GATEWAY,
            FailureKind::Rejected => StatusCode::BAD_REQUEST,
        }
    }

    fn message(&self) -> String {
        match self.error.kind() {
            FailureKind::Overloaded | FailureKind::UpstreamSlow => self.error.to_string(),
            FailureKind::UpstreamError => format!("Failed to crawl URL: {}", self.error),
            FailureKind::Rejected => format!("Invalid request: {}", self.error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = CrawlErrorResponse::new(self.url.clone(), self.message());
        let mut response = (status, axum::Json(body)).into_response();

        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }

        response
    }
}
