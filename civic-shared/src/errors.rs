use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Review console errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,

    // Review console (E1xxx)
    FetchFailure,
    WriteFailure,
    PreconditionFailed,
    InvalidCropState,
    ReportNotFound,
    WriteInFlight,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",

            // Review console
            Self::FetchFailure => "E1001",
            Self::WriteFailure => "E1002",
            Self::PreconditionFailed => "E1003",
            Self::InvalidCropState => "E1004",
            Self::ReportNotFound => "E1005",
            Self::WriteInFlight => "E1006",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError => StatusCode::BAD_REQUEST,
            Self::ReportNotFound => StatusCode::NOT_FOUND,
            Self::FetchFailure | Self::WriteFailure => StatusCode::BAD_GATEWAY,
            Self::PreconditionFailed | Self::WriteInFlight => StatusCode::CONFLICT,
            Self::InvalidCropState => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Boundary failures the operator may simply try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchFailure | Self::WriteFailure)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn fetch_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::FetchFailure, message)
    }

    pub fn write_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::WriteFailure, message)
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PreconditionFailed, message)
    }

    pub fn invalid_crop_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidCropState, message)
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Internal(_) => ErrorCode::InternalError,
            AppError::Validation(_) => ErrorCode::ValidationError,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                if status.is_server_error() {
                    tracing::error!(code = code.code(), "{message}");
                } else {
                    tracing::warn!(code = code.code(), "{message}");
                }
                let mut resp = ApiErrorResponse::new(code.code(), message).retryable(code.is_retryable());
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
