//! Error types for pollchain.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Previous poll not found: {0}")]
    PreviousPollNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Voter has already voted on this poll")]
    AlreadyVoted,

    #[error("Vote limit reached, voting is closed")]
    VotingClosed,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    // === Server Errors ===
    #[error("System is overloaded, retry later")]
    Overloaded,

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Vote recorded but successor poll could not be created: {0}")]
    ChainSpawn(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_) | Self::PreviousPollNotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::InvalidSelection(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyVoted | Self::VotingClosed | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Timeout(_) => StatusCode::REQUEST_TIMEOUT,

            // 5xx Server Errors
            Self::Overloaded | Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ChainSpawn(_) | Self::Database(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::PreviousPollNotFound(_) => "PREVIOUS_POLL_NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidSelection(_) => "INVALID_SELECTION",
            Self::AlreadyVoted => "ALREADY_VOTED",
            Self::VotingClosed => "VOTING_CLOSED",
            Self::Conflict(_) => "CONFLICT",
            Self::Timeout(_) => "TIMEOUT",
            Self::Overloaded => "OVERLOADED",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::ChainSpawn(_) => "CHAIN_SPAWN_FAILED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Log server errors
        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_have_distinct_codes() {
        let codes = [
            AppError::NotFound("p".to_string()).error_code(),
            AppError::InvalidSelection("x".to_string()).error_code(),
            AppError::AlreadyVoted.error_code(),
            AppError::VotingClosed.error_code(),
            AppError::Overloaded.error_code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotFound("p".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::PreviousPollNotFound("p".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::AlreadyVoted.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Timeout("vote".to_string()).status_code(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert!(AppError::Overloaded.is_server_error());
        assert!(AppError::ChainSpawn("boom".to_string()).is_server_error());
        assert!(!AppError::VotingClosed.is_server_error());
    }
}
