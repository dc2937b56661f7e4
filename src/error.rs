// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::inference::InferenceError;
use crate::services::identity::AuthError;
use crate::services::storage::StorageError;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Missing or invalid authorization header")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("{0}")]
    AuthFailed(String),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    ModelNotReady(String),

    #[error("{0}")]
    Inference(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: &'static str,
    detail: String,
}

impl AppError {
    /// Status code and stable error code for this error.
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AppError::AuthFailed(_) => (StatusCode::UNAUTHORIZED, "auth_failed"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            AppError::Upstream(_) => (StatusCode::BAD_REQUEST, "upstream_error"),
            AppError::ModelNotReady(_) => (StatusCode::SERVICE_UNAVAILABLE, "model_not_ready"),
            AppError::Inference(_) => (StatusCode::INTERNAL_SERVER_ERROR, "inference_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.status();

        match &self {
            AppError::Upstream(msg) => tracing::warn!(error = %msg, "Upstream provider error"),
            AppError::Inference(msg) => tracing::error!(error = %msg, "Inference failed"),
            AppError::Internal(err) => tracing::error!(error = %err, "Internal server error"),
            _ => {}
        }

        let body = ErrorResponse {
            success: false,
            error,
            detail: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken => AppError::InvalidToken,
            AuthError::Rejected(msg) => AppError::AuthFailed(msg),
            AuthError::Provider(msg) => AppError::Upstream(msg),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnsupportedType(_) => AppError::BadRequest(err.to_string()),
            StorageError::Rejected(_) | StorageError::Request(_) => {
                AppError::Upstream(format!("Failed to upload image: {}", err))
            }
        }
    }
}

impl From<InferenceError> for AppError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::NotReady { .. } => AppError::ModelNotReady(err.to_string()),
            InferenceError::InvalidInput(msg) => AppError::BadRequest(msg),
            InferenceError::Backend(_) | InferenceError::MalformedOutput(_) => {
                AppError::Inference(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge(rejection.body_text());
        }
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Body limit overruns surface while reading fields.
impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge(err.body_text());
        }
        AppError::BadRequest(err.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_map_to_401() {
        let err: AppError = AuthError::InvalidToken.into();
        assert_eq!(err.status().0, StatusCode::UNAUTHORIZED);

        let err: AppError = AuthError::Rejected("Invalid login credentials".to_string()).into();
        assert_eq!(err.status().0, StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Invalid login credentials");
    }

    #[test]
    fn test_provider_failures_are_upstream() {
        let err: AppError = AuthError::Provider("connection refused".to_string()).into();
        assert_eq!(err.status(), (StatusCode::BAD_REQUEST, "upstream_error"));

        let err: AppError = StorageError::Rejected("quota exceeded".to_string()).into();
        assert_eq!(err.status().0, StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_model_not_ready_is_503() {
        let err: AppError = InferenceError::NotReady {
            model: "vit".to_string(),
            state: "loading (50%)".to_string(),
        }
        .into();
        assert_eq!(err.status().0, StatusCode::SERVICE_UNAVAILABLE);
    }
}
