//! Error types for the orchestrator and the HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// API error type that converts to proper HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        };

        let body = json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience alias.
pub type ApiResult<T> = Result<T, ApiError>;

/// Session store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another writer updated the session since it was read.
    #[error("session {user_id} changed concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        user_id: String,
        expected: u64,
        found: u64,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Conflict(e.to_string())
    }
}

/// Lead delivery failures. Logged by the dispatcher, never shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("delivery rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type SinkResult<T> = Result<T, SinkError>;

/// Classifier client failures. Degraded to an unknown intent by the caller.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Transport(String),

    #[error("classifier returned HTTP {0}")]
    Status(u16),

    #[error("malformed classifier output: {0}")]
    Malformed(String),
}

pub type ClassifierResult<T> = Result<T, ClassifierError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn not_found_response() {
        let err = ApiError::NotFound("session 42".into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], 404);
        assert!(json["error"].as_str().unwrap().contains("42"));
    }

    #[tokio::test]
    async fn bad_request_response() {
        let err = ApiError::BadRequest("empty message".into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn version_conflict_maps_to_409() {
        let err: ApiError = StoreError::VersionConflict {
            user_id: "7".into(),
            expected: 1,
            found: 2,
        }
        .into();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }
}
