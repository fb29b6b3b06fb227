//! Error responses shared by the API handlers.

use axum::{extract::rejection::JsonRejection, http::StatusCode, Json};
use serde::Serialize;

use misfits_core::{ErrorKind, ReconcileError};

/// Error body for every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Transport => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn reconcile_error(e: ReconcileError) -> ApiError {
    api_error(status_for(e.kind()), e.to_string())
}

/// Malformed or mistyped request bodies are validation failures.
pub fn body_error(rejection: JsonRejection) -> ApiError {
    api_error(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text())
}
