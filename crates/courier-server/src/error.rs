//! HTTP error mapping.
//!
//! Validation -> 400, missing credential -> 401, no accepted connection ->
//! 403, unknown id -> 404, everything else -> 500 with the internal detail
//! logged and a generic body returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use courier_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed required input.
    #[error("{0}")]
    Validation(String),

    /// Missing or malformed caller credential.
    #[error("missing or invalid credential")]
    Unauthorized,

    /// Storage-layer outcome, mapped by its own kind.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Anything else.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Store(StoreError::Validation(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Store(StoreError::PermissionDenied) => StatusCode::FORBIDDEN,
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal detail is logged, never returned to the caller.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Internal server error");
            crate::metrics::record_error("internal");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Store(StoreError::PermissionDenied).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::Store(StoreError::NotFound("message")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Store(StoreError::Decode("oops".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
