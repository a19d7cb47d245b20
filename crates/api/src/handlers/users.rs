//! User population and membership endpoints

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use segmentify_domain::{MembershipChange, Period};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::response::{bad_request, domain_error, validation_error};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct UserSegmentsResponse {
    pub id: i64,
    pub segments: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SegmentToAdd {
    pub slug: String,
    pub expire_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SegmentToRemove {
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserSegmentsRequest {
    pub segments_to_add: Option<Vec<SegmentToAdd>>,
    pub segments_to_remove: Option<Vec<SegmentToRemove>>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub period: Option<String>,
}

/// POST /users
pub async fn create(State(state): State<AppState>) -> Response {
    match state.service.create_user().await {
        Ok(id) => {
            info!(id, "user created");
            (StatusCode::CREATED, Json(CreateUserResponse { id })).into_response()
        }
        Err(err) => domain_error(err, "failed to create user"),
    }
}

/// GET /users/{user_id}/segments
pub async fn get_segments(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
) -> Response {
    let Ok(Path(user_id)) = user_id else {
        return bad_request("user_id is invalid");
    };

    match state.service.get_user_segments(user_id).await {
        Ok(segments) => Json(UserSegmentsResponse { id: user_id, segments }).into_response(),
        Err(err) => domain_error(err, "failed to get user segments"),
    }
}

/// PATCH /users/{user_id}/segments
pub async fn update_segments(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateUserSegmentsRequest>, JsonRejection>,
) -> Response {
    let Ok(Path(user_id)) = user_id else {
        return bad_request("user_id is invalid");
    };
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    let Some(to_add) = request.segments_to_add else {
        return validation_error("field segments_to_add is a required field");
    };
    let Some(to_remove) = request.segments_to_remove else {
        return validation_error("field segments_to_remove is a required field");
    };

    if has_overlap(&to_add, &to_remove) {
        return bad_request("segments_to_add and segments_to_remove overlap");
    }

    let to_add: Vec<MembershipChange> = to_add
        .into_iter()
        .map(|add| MembershipChange { slug: add.slug, expire_at: add.expire_at })
        .collect();
    let to_remove: Vec<String> = to_remove.into_iter().map(|remove| remove.slug).collect();

    match state.service.update_user_segments(user_id, to_add, to_remove).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => domain_error(err, "failed to update user segments"),
    }
}

/// GET /users/{user_id}/download-segments-history?period=YYYY-MM
pub async fn download_history(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let Ok(Path(user_id)) = user_id else {
        return bad_request("user_id is invalid");
    };
    let period = match query.period.as_deref().map(str::parse::<Period>) {
        Some(Ok(period)) => period,
        _ => {
            return bad_request(
                "invalid query param 'period'. Should be formatted like 'yyyy-mm'",
            )
        }
    };

    let report = match state.service.get_user_segments_history(user_id, period).await {
        Ok(report) => report,
        Err(err) => return domain_error(err, "failed to get user segments history"),
    };

    match render_csv(&report) {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv"),
                (header::CONTENT_DISPOSITION, "attachment; filename=report.csv"),
            ],
            bytes,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to write csv");
            domain_error(
                segmentify_domain::SegmentifyError::Internal(err),
                "failed to write csv",
            )
        }
    }
}

fn has_overlap(to_add: &[SegmentToAdd], to_remove: &[SegmentToRemove]) -> bool {
    to_add.iter().any(|add| to_remove.iter().any(|remove| remove.slug == add.slug))
}

/// One row per audit record, no header: user id, slug, operation, RFC 3339
/// timestamp.
fn render_csv(report: &[segmentify_domain::AuditEntry]) -> Result<Vec<u8>, String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for entry in report {
        writer
            .write_record([
                entry.user_id.to_string(),
                entry.segment_slug.clone(),
                entry.operation.to_string(),
                entry.created_at.to_rfc3339(),
            ])
            .map_err(|err| err.to_string())?;
    }
    writer.into_inner().map_err(|err| err.to_string())
}
