//! Error types for crmflow-dedup HTTP handlers

use crate::types::DedupError;
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

    /// Candidate lookup failed upstream (502)
    #[error(transparent)]
    Dedup(#[from] DedupError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Dedup(ref err) => match err {
                DedupError::Lookup { .. } => {
                    (StatusCode::BAD_GATEWAY, "LOOKUP_FAILED", err.to_string())
                }
            },
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
    use crate::types::{ClientError, DedupKey, RunState};

    #[test]
    fn test_lookup_failure_maps_to_bad_gateway() {
        let err = ApiError::from(DedupError::Lookup {
            key: DedupKey::parse(Some("+15550100")).unwrap(),
            source: ClientError::Timeout(10_000),
            state: RunState::Aborted,
        });
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_bad_request_status() {
        let err = ApiError::BadRequest("missing body".to_string());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
