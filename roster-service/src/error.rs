use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use roster_engine::validate::ValidationReport;

#[derive(Debug, Error)]
pub enum RosterServiceError {
    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("validation failed with {} error(s)", report.errors.len())]
    Validation { report: ValidationReport },

    #[error("Problem too large: {0}")]
    Capacity(String),

    #[error("Result not ready: {0}")]
    NotReady(String),

    #[error("Gone: {0}")]
    Gone(String),

    #[error("Solve timed out after {0} seconds of wall clock")]
    HardTimeout(u64),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Job store error: {0}")]
    Store(#[from] redis::RedisError),
}

impl From<roster_engine::EngineError> for RosterServiceError {
    fn from(err: roster_engine::EngineError) -> Self {
        match err {
            roster_engine::EngineError::Validation { report } => Self::Validation { report },
            roster_engine::EngineError::Input(message) => Self::BadRequest(message),
            roster_engine::EngineError::Capacity(message) => Self::Capacity(message),
            roster_engine::EngineError::Solver(message) => Self::Internal(message),
        }
    }
}

/// Error envelope: `{code, message, fieldErrors, warnings}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<roster_engine::validate::ValidationIssue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<roster_engine::validate::ValidationIssue>,
}

impl IntoResponse for RosterServiceError {
    fn into_response(self) -> Response {
        let (status, code, message, field_errors, warnings) = match self {
            Self::NotFound(message) => (StatusCode::NOT_FOUND, "NOT_FOUND", message, vec![], vec![]),
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", message, vec![], vec![])
            }
            Self::Validation { report } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
                format!("input failed validation with {} error(s)", report.errors.len()),
                report.errors,
                report.warnings,
            ),
            Self::Capacity(message) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PROBLEM_TOO_LARGE",
                message,
                vec![],
                vec![],
            ),
            Self::NotReady(message) => (
                StatusCode::TOO_EARLY,
                "RESULT_NOT_READY",
                message,
                vec![],
                vec![],
            ),
            Self::Gone(message) => (StatusCode::GONE, "RESULT_GONE", message, vec![], vec![]),
            Self::HardTimeout(seconds) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "HARD_TIMEOUT",
                format!("solve exceeded the hard wall-clock limit of {seconds}s"),
                vec![],
                vec![],
            ),
            Self::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                message,
                vec![],
                vec![],
            ),
            Self::Store(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "JOB_STORE",
                format!("job store unavailable: {err}"),
                vec![],
                vec![],
            ),
        };

        if status.is_server_error() {
            tracing::error!(%status, code, "server error: {message}");
        } else {
            tracing::warn!(%status, code, "client error: {message}");
        }

        let body = ErrorEnvelope {
            code: code.to_string(),
            message,
            field_errors,
            warnings,
        };
        (status, axum::Json(body)).into_response()
    }
}
