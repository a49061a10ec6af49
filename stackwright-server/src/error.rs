//! JSON error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use stackwright_core::GenerateError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// An error rendered as `{ "error": ..., "details"?: ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    details: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: message.into(),
            details: None,
        }
    }

    /// Map a core error. Validation failures keep their own message;
    /// anything else is reported as `summary` with the cause in `details`.
    pub fn from_generate(err: GenerateError, summary: &str) -> Self {
        if err.is_client_error() {
            return Self::bad_request(err.to_string());
        }
        tracing::error!(error = %err, "{summary}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: summary.to_string(),
            details: Some(err.details()),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}
