// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::meeting::MeetingStatus;
use crate::validation::ValidationError;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller is known but may not perform the action
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Missing, malformed or expired credentials
    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Meeting {meeting_id} cannot move from {from} to {to}")]
    InvalidTransition {
        meeting_id: String,
        from: MeetingStatus,
        to: MeetingStatus,
    },

    /// The meeting exists but its state forbids the change
    #[error("Meeting {meeting_id} is {status} and can no longer be edited")]
    MeetingClosed {
        meeting_id: String,
        status: MeetingStatus,
    },

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Body or query string that could not be decoded
    #[error("Malformed request: {0}")]
    Json(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidTransition { .. } | AppError::MeetingClosed { .. } => {
                StatusCode::CONFLICT
            },
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Persistence(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NF_001",
            AppError::Forbidden(_) => "AUTHZ_001",
            AppError::Unauthorized(_) => "AUTH_001",
            AppError::Validation(_) => "VAL_001",
            AppError::Persistence(_) => "STORE_001",
            AppError::InvalidTransition { .. } => "MEETING_001",
            AppError::MeetingClosed { .. } => "MEETING_002",
            AppError::RateLimitExceeded => "RATE_001",
            AppError::Json(_) => "JSON_001",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::NotFound(what) => format!("{what} not found"),
            AppError::Forbidden(reason) => reason.clone(),
            AppError::Unauthorized(_) => "Authentication required".to_string(),
            AppError::Validation(e) => e.to_string(),
            AppError::Persistence(_) => "Storage is temporarily unavailable".to_string(),
            AppError::InvalidTransition { .. } | AppError::MeetingClosed { .. } => self.to_string(),
            AppError::RateLimitExceeded => {
                "Rate limit exceeded, please try again later".to_string()
            },
            AppError::Json(_) => "Invalid request format".to_string(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }

    /// Whether a real-time handler should report this error back to the
    /// originating connection. Everything else is only logged.
    pub fn is_client_visible(&self) -> bool {
        matches!(
            self,
            AppError::Forbidden(_) | AppError::Validation(_) | AppError::Persistence(_)
        )
    }

    pub(crate) fn persistence(err: impl std::fmt::Display) -> Self {
        AppError::Persistence(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        } else {
            tracing::debug!(code = error_code, error = %self, "request rejected");
        }

        let body = serde_json::json!({
            "success": false,
            "error": message,
            "code": error_code,
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Json(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Json(rejection.body_text())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::Unauthorized(err.to_string())
    }
}
