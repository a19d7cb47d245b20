//! Error types used throughout the application

use thiserror::Error;

/// Main error type for Segmentify
///
/// Each variant carries the identifier of the offending entity so that the
/// HTTP adapter can render a precise error message without reaching back
/// into storage.
#[derive(Error, Debug)]
pub enum SegmentifyError {
    #[error("segment with slug={slug} already exists")]
    SegmentExists { slug: String },

    #[error("segment with slug={slug} not found")]
    SegmentNotFound { slug: String },

    #[error("user with id={id} not found")]
    UserNotFound { id: i64 },

    #[error("user segment with slug={slug} already exists")]
    UserSegmentExists { slug: String },

    #[error("user segment with slug={slug} not found")]
    UserSegmentNotFound { slug: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for Segmentify operations
pub type Result<T> = std::result::Result<T, SegmentifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_offending_identifier() {
        let err = SegmentifyError::SegmentExists { slug: "AVITO_50".into() };
        assert_eq!(err.to_string(), "segment with slug=AVITO_50 already exists");

        let err = SegmentifyError::UserNotFound { id: 999 };
        assert_eq!(err.to_string(), "user with id=999 not found");

        let err = SegmentifyError::UserSegmentNotFound { slug: "B".into() };
        assert_eq!(err.to_string(), "user segment with slug=B not found");
    }

    #[test]
    fn internal_wraps_message() {
        let err = SegmentifyError::Internal("connection reset".into());
        assert!(err.to_string().contains("connection reset"));
    }
}
