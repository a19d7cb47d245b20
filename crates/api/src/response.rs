//! Error rendering
//!
//! Every non-2xx body is `{"detail": <message>}`. Domain errors render
//! their own message (which carries the offending identifier); anything
//! unexpected is logged with its operation context and replaced by a fixed
//! per-operation message so backend details never reach clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use segmentify_domain::SegmentifyError;
use serde::Serialize;
use tracing::error;

/// Error body shared by all non-2xx responses
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

pub fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(ErrorBody { detail: detail.into() })).into_response()
}

pub fn bad_request(detail: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, detail)
}

pub fn validation_error(detail: impl Into<String>) -> Response {
    error_response(StatusCode::UNPROCESSABLE_ENTITY, detail)
}

/// Map a core error to its HTTP rendering.
///
/// `internal_detail` is the fixed client-facing message used when the error
/// is not part of the domain taxonomy.
pub fn domain_error(err: SegmentifyError, internal_detail: &str) -> Response {
    let status = match &err {
        SegmentifyError::SegmentExists { .. } | SegmentifyError::UserSegmentExists { .. } => {
            StatusCode::BAD_REQUEST
        }
        SegmentifyError::SegmentNotFound { .. }
        | SegmentifyError::UserNotFound { .. }
        | SegmentifyError::UserSegmentNotFound { .. } => StatusCode::NOT_FOUND,
        SegmentifyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        SegmentifyError::Config(_) | SegmentifyError::Internal(_) => {
            error!(error = %err, "{internal_detail}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, internal_detail);
        }
    };

    error_response(status, err.to_string())
}
