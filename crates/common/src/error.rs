//! Error types for agora.

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
    // === Domain Errors ===
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Content is not votable: {0}")]
    ContentNotVotable(String),

    #[error("Voting window closed for content: {0}")]
    VoteWindowClosed(String),

    #[error("Option {option_id} does not belong to content {content_id}")]
    InvalidOption {
        content_id: String,
        option_id: String,
    },

    #[error("Event is full ({max_participants} participants)")]
    EventFull { max_participants: i32 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Content type mismatch: expected {expected}, got {actual}")]
    ContentTypeMismatch { expected: String, actual: String },

    #[error("Content is closed: {0}")]
    ContentClosed(String),

    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // === Server Errors ===
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Redis error: {0}")]
    Redis(String),

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
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_)
            | Self::InvalidAmount(_)
            | Self::InvalidOption { .. }
            | Self::ContentTypeMismatch { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict(_)
            | Self::InvalidStateTransition { .. }
            | Self::ContentNotVotable(_)
            | Self::VoteWindowClosed(_)
            | Self::EventFull { .. }
            | Self::ContentClosed(_) => StatusCode::CONFLICT,

            // 5xx Server Errors
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Redis(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::ContentNotVotable(_) => "CONTENT_NOT_VOTABLE",
            Self::VoteWindowClosed(_) => "VOTE_WINDOW_CLOSED",
            Self::InvalidOption { .. } => "INVALID_OPTION",
            Self::EventFull { .. } => "EVENT_FULL",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::ContentTypeMismatch { .. } => "CONTENT_TYPE_MISMATCH",
            Self::ContentClosed(_) => "CONTENT_CLOSED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message suitable for showing to an end user.
    ///
    /// Server-side failures collapse into a single retry hint so internals
    /// never leak into the UI.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidStateTransition { from, to } => {
                format!("This item cannot move from {from} to {to}.")
            }
            Self::ContentNotVotable(_) => "This item is not open for voting.".to_string(),
            Self::VoteWindowClosed(_) => "Voting has closed for this poll.".to_string(),
            Self::InvalidOption { .. } => "That option is not part of this poll.".to_string(),
            Self::EventFull { .. } => "This event is full.".to_string(),
            Self::InvalidAmount(_) => "The amount must be greater than zero.".to_string(),
            Self::ContentTypeMismatch { expected, .. } => {
                format!("This action is only available for {expected} items.")
            }
            Self::ContentClosed(_) => "This item is already completed.".to_string(),
            Self::NotFound(_) => "The requested item could not be found.".to_string(),
            Self::Unauthorized => "You need to sign in to do that.".to_string(),
            Self::Forbidden(_) => "You are not allowed to do that.".to_string(),
            Self::Validation(msg) => format!("Invalid input: {msg}"),
            Self::Conflict(_) => "This request conflicts with an earlier one.".to_string(),
            Self::StoreUnavailable(_) | Self::Redis(_) | Self::Config(_) | Self::Internal(_) => {
                "Something went wrong. Please try again.".to_string()
            }
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

        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.user_message(),
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
    fn test_domain_errors_are_client_errors() {
        let errors = [
            AppError::InvalidStateTransition {
                from: "draft".to_string(),
                to: "completed".to_string(),
            },
            AppError::ContentNotVotable("c1".to_string()),
            AppError::VoteWindowClosed("c1".to_string()),
            AppError::EventFull {
                max_participants: 2,
            },
            AppError::InvalidAmount("0".to_string()),
        ];

        for err in errors {
            assert!(!err.is_server_error(), "{err} should be a client error");
        }
    }

    #[test]
    fn test_store_unavailable_is_server_error() {
        let err = AppError::StoreUnavailable("connection refused".to_string());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), "STORE_UNAVAILABLE");
        assert!(err.is_server_error());
    }

    #[test]
    fn test_user_messages_are_distinct_per_kind() {
        let errors = [
            AppError::InvalidStateTransition {
                from: "voting".to_string(),
                to: "completed".to_string(),
            },
            AppError::ContentNotVotable("c1".to_string()),
            AppError::VoteWindowClosed("c1".to_string()),
            AppError::InvalidOption {
                content_id: "c1".to_string(),
                option_id: "o9".to_string(),
            },
            AppError::EventFull {
                max_participants: 2,
            },
            AppError::InvalidAmount("-1".to_string()),
            AppError::NotFound("c1".to_string()),
        ];

        let messages: std::collections::HashSet<String> =
            errors.iter().map(AppError::user_message).collect();
        assert_eq!(messages.len(), errors.len());
    }

    #[test]
    fn test_server_errors_suggest_retry() {
        let store = AppError::StoreUnavailable("timeout".to_string());
        let internal = AppError::Internal("boom".to_string());

        assert!(store.user_message().contains("try again"));
        assert_eq!(store.user_message(), internal.user_message());
        assert!(!store.user_message().contains("timeout"));
    }
}
