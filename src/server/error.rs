//! Endpoint error type.
//!
//! Every failure leaves the endpoint as `{ "error": ..., "details": ... }` so the
//! checkout can surface `error` and log `details`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use super::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or invalid request.
    #[error("{message}")]
    BadRequest { message: String, details: Option<String> },

    /// Bearer token missing where required, or not a live session.
    #[error("{0}")]
    Unauthorized(String),

    /// Session user differs from the `userId` in the body.
    #[error("Session does not match the order's user")]
    Forbidden,

    /// Key already bound to a different order.
    #[error("Idempotency-Key was already used for a different order")]
    IdempotencyConflict,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into(), details: None }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::IdempotencyConflict => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            // Don't expose storage details to callers
            Self::Store(err) => {
                tracing::error!(error = %err, "order store failure");
                ErrorBody { error: "Internal server error".to_string(), details: None }
            }
            Self::BadRequest { message, details } => ErrorBody { error: message, details },
            other => ErrorBody { error: other.to_string(), details: None },
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::IdempotencyConflict.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::Store(StoreError::Corrupt("bad".into())).into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_store_error_hides_detail() {
        let response = ApiError::Store(StoreError::Corrupt("row 7".into())).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["error"], "Internal server error");
        assert!(v.get("details").is_none());
    }
}
