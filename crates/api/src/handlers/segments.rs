//! Segment catalog endpoints

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use segmentify_domain::Segment;
use serde::Deserialize;
use tracing::info;

use crate::response::{bad_request, domain_error, validation_error};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSegmentRequest {
    pub slug: Option<String>,
    pub percent: Option<i64>,
}

/// POST /segments
pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<CreateSegmentRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    let slug = match request.slug {
        Some(slug) if !slug.is_empty() => slug,
        _ => return validation_error("field slug is a required field"),
    };
    let percent = request.percent.unwrap_or(0);
    if !(0..=100).contains(&percent) {
        return validation_error("field percent must be between 0 and 100");
    }

    match state.service.create_segment(Segment { slug, percent: percent as i16 }).await {
        Ok(segment) => {
            info!(slug = %segment.slug, "segment created");
            (StatusCode::CREATED, Json(segment)).into_response()
        }
        Err(err) => domain_error(err, "failed to create segment"),
    }
}

/// GET /segments/{slug}
pub async fn get_by_slug(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    match state.service.get_segment(&slug).await {
        Ok(segment) => Json(segment).into_response(),
        Err(err) => domain_error(err, "failed to get segment"),
    }
}

/// DELETE /segments/{slug}
pub async fn delete(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    match state.service.delete_segment(&slug).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => domain_error(err, "failed to delete segment"),
    }
}
