//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`clipvault_core::Error`] so that route
//! handlers can return `Result<T, AppError>` directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
pub struct AppError {
    inner: clipvault_core::Error,
}

impl AppError {
    pub fn new(inner: clipvault_core::Error) -> Self {
        Self { inner }
    }
}

impl From<clipvault_core::Error> for AppError {
    fn from(e: clipvault_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        }

        let code = match &self.inner {
            clipvault_core::Error::NotFound { .. } => "not_found",
            clipvault_core::Error::Validation(_) => "validation_error",
            clipvault_core::Error::InvalidRange(_) => "invalid_range",
            clipvault_core::Error::SourceMissing(_) => "source_missing",
            clipvault_core::Error::Extraction(_) => "extraction_error",
            clipvault_core::Error::Probe(_) => "probe_error",
            clipvault_core::Error::FileConflict(_) => "file_conflict",
            clipvault_core::Error::Conflict(_) => "conflict",
            clipvault_core::Error::Database { .. } => "database_error",
            clipvault_core::Error::Io { .. } => "io_error",
            clipvault_core::Error::Tool { .. } => "tool_error",
            clipvault_core::Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.inner.to_string(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_produces_404() {
        let err = AppError::new(clipvault_core::Error::not_found("video", "abc"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_range_produces_400() {
        let err = AppError::new(clipvault_core::Error::InvalidRange("start >= end".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn file_conflict_produces_409() {
        let err = AppError::new(clipvault_core::Error::FileConflict("in use".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn probe_produces_422() {
        let err = AppError::new(clipvault_core::Error::Probe("no duration".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
