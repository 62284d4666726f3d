//! HTTP error type for boardsync-engine

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Engine error, status derived from its kind
    #[error(transparent)]
    Common(#[from] boardsync_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use boardsync_common::Error;

        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Common(err) => {
                let status = match &err {
                    Error::NotFound(_) => StatusCode::NOT_FOUND,
                    Error::InvalidState(_) => StatusCode::CONFLICT,
                    Error::InvalidInput(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
                    Error::Database(_)
                    | Error::Io(_)
                    | Error::Serialization(_)
                    | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %err, "Request failed");
                }
                (status, err.code(), err.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use boardsync_common::Error;

    #[test]
    fn test_status_mapping() {
        let status = |e: Error| ApiError::from(e).into_response().status();
        assert_eq!(status(Error::NotFound("board".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(Error::InvalidState("source".into())), StatusCode::CONFLICT);
        assert_eq!(status(Error::InvalidInput("limit".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::Internal("boom".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ApiError::BadRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
