use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::VoteError;
use crate::store::StoreError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug)]
pub enum AppError {
    DatabaseError(String),
    ValidationError(String),
    AuthenticationError(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    AlreadyVoted,
    /// Poll is not currently votable; `reason` is the machine-readable code
    /// (`not-started` / `not-active` / `closed`).
    InvalidState {
        reason: &'static str,
        message: String,
    },
    BadRequest(String),
    InternalError(String),
    SerializationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::AuthenticationError(msg) => write!(f, "Authentication error: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::AlreadyVoted => write!(f, "Already voted"),
            AppError::InvalidState { reason, message } => {
                write!(f, "Invalid state ({}): {}", reason, message)
            }
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            AppError::DatabaseError(msg) => {
                tracing::error!(error = %msg, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database operation failed".to_string(),
                    None,
                )
            }
            AppError::ValidationError(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg, None)
            }
            AppError::AuthenticationError(msg) => {
                (StatusCode::UNAUTHORIZED, "AUTHENTICATION_ERROR", msg, None)
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg, None),
            AppError::AlreadyVoted => (
                StatusCode::CONFLICT,
                "ALREADY_VOTED",
                "You have already voted on this poll".to_string(),
                None,
            ),
            AppError::InvalidState { reason, message } => (
                StatusCode::CONFLICT,
                "INVALID_STATE",
                message,
                Some(reason.to_string()),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            AppError::SerializationError(msg) => {
                tracing::error!(error = %msg, "serialization error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SERIALIZATION_ERROR",
                    "Data serialization failed".to_string(),
                    None,
                )
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => AppError::Conflict(
                "The operation could not be committed due to concurrent activity".to_string(),
            ),
            StoreError::Encode(e) => AppError::SerializationError(e.to_string()),
            StoreError::Decode(e) => AppError::SerializationError(e.to_string()),
            StoreError::Backend(msg) => AppError::DatabaseError(msg),
        }
    }
}

impl From<VoteError> for AppError {
    fn from(err: VoteError) -> Self {
        match err {
            VoteError::PollNotFound => AppError::NotFound("Poll not found".to_string()),
            VoteError::PermissionDenied(msg) => AppError::Forbidden(msg),
            VoteError::NotVotable(reason) => AppError::InvalidState {
                reason: reason.as_str(),
                message: format!("Poll is not accepting votes ({})", reason.as_str()),
            },
            VoteError::InvalidArgument(msg) => AppError::BadRequest(msg),
            VoteError::AlreadyVoted => AppError::AlreadyVoted,
            VoteError::Conflict => AppError::Conflict(
                "The vote could not be committed under load. Please try again".to_string(),
            ),
            VoteError::Store(err) => err.into(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}
