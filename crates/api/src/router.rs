//! Router assembly and HTTP middleware

use std::time::{Duration, Instant};

use axum::error_handling::HandleErrorLayer;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{BoxError, Router};
use tower::ServiceBuilder;
use tracing::info;

use crate::handlers::{segments, users};
use crate::response::error_response;
use crate::state::AppState;

/// Build the application router with request logging and a per-request
/// timeout.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/segments", post(segments::create))
        .route("/segments/{slug}", get(segments::get_by_slug).delete(segments::delete))
        .route("/users", post(users::create))
        .route(
            "/users/{user_id}/segments",
            get(users::get_segments).patch(users::update_segments),
        )
        .route("/users/{user_id}/download-segments-history", get(users::download_history))
        .layer(middleware::from_fn(log_requests))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(request_timeout),
        )
        .with_state(state)
}

/// Per-request structured log line: method, path, status, latency
async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        "request completed"
    );
    response
}

async fn handle_middleware_error(err: BoxError) -> Response {
    if err.is::<tower::timeout::error::Elapsed>() {
        error_response(StatusCode::REQUEST_TIMEOUT, "request timed out")
    } else {
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}
