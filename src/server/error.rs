//! Error responses for the HTTP surface.
//!
//! Only request problems (gate, missing fields, bad uploads) become errors
//! here. A review that ran but could not produce a completion is a 200 with
//! the explanatory outcome in the body.

use crate::access::AccessDenied;
use crate::error::CounselError;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    Denied(#[from] AccessDenied),

    #[error("Test mode is not enabled on this server")]
    TestModeDisabled,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upload exceeds the {limit}-byte limit")]
    PayloadTooLarge { limit: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::Denied(AccessDenied::NotAuthenticated) => {
                (StatusCode::UNAUTHORIZED, AccessDenied::NotAuthenticated.code())
            }
            ServerError::Denied(AccessDenied::DisclaimerNotAccepted) => (
                StatusCode::FORBIDDEN,
                AccessDenied::DisclaimerNotAccepted.code(),
            ),
            ServerError::TestModeDisabled => (StatusCode::FORBIDDEN, "TEST_MODE_DISABLED"),
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ServerError::PayloadTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl ServerError {
    /// Map a multipart read failure; `limit` is the upload cap in bytes.
    pub fn from_multipart(err: MultipartError, limit: u64) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge { limit }
        } else {
            ServerError::InvalidRequest(err.body_text())
        }
    }
}

/// Errors from reading a test-mode document off disk.
impl From<CounselError> for ServerError {
    fn from(err: CounselError) -> Self {
        match err {
            CounselError::DocumentTooLarge { limit, .. } => ServerError::PayloadTooLarge { limit },
            CounselError::FileNotFound { .. }
            | CounselError::PermissionDenied { .. }
            | CounselError::Unreadable(_) => ServerError::InvalidRequest(err.to_string()),
            other => ServerError::Internal(other.to_string()),
        }
    }
}
