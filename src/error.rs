//! Engine and application error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Typed failures of SLA record operations. Callers branch on these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlaError {
    #[error("{field} is already set")]
    AlreadySet { field: &'static str },

    #[error("SLA is already paused")]
    AlreadyPaused,

    #[error("SLA is not paused")]
    NotPaused,

    #[error("SLA record is resolved")]
    TerminalRecord,

    #[error("Timestamp precedes {what}")]
    InvalidOrder { what: &'static str },

    #[error("No SLA record for case {0}")]
    RecordNotFound(Uuid),

    #[error("Malformed SLA record: {0}")]
    MalformedRecord(String),
}

impl SlaError {
    /// Stable kind name exposed to API clients
    pub fn kind(&self) -> &'static str {
        match self {
            SlaError::AlreadySet { .. } => "AlreadySet",
            SlaError::AlreadyPaused => "AlreadyPaused",
            SlaError::NotPaused => "NotPaused",
            SlaError::TerminalRecord => "TerminalRecord",
            SlaError::InvalidOrder { .. } => "InvalidOrder",
            SlaError::RecordNotFound(_) => "RecordNotFound",
            SlaError::MalformedRecord(_) => "MalformedRecord",
        }
    }
}

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Sla(#[from] SlaError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            AppError::Sla(err) => {
                let status = match err {
                    SlaError::RecordNotFound(_) => StatusCode::NOT_FOUND,
                    SlaError::AlreadySet { .. }
                    | SlaError::AlreadyPaused
                    | SlaError::NotPaused
                    | SlaError::TerminalRecord => StatusCode::CONFLICT,
                    SlaError::InvalidOrder { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    SlaError::MalformedRecord(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.kind())
            }
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "InvalidRequest"),
            AppError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        };

        let body = Json(json!({
            "error": self.to_string(),
            "code": status.as_u16(),
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidRequest(err.to_string())
    }
}
