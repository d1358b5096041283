/// Unified error types for HerdWatch
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum HerdError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Missing or invalid authenticated owner
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Bad client input (missing file, unsupported type, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Upload larger than the configured limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// File or record persistence failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record fetch failure while computing statistics
    #[error("Aggregation error: {0}")]
    Aggregation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON error body returned to clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl HerdError {
    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            HerdError::Validation(_) => StatusCode::BAD_REQUEST,
            HerdError::Authentication(_) => StatusCode::UNAUTHORIZED,
            HerdError::NotFound(_) => StatusCode::NOT_FOUND,
            HerdError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert HerdError to HTTP response
impl IntoResponse for HerdError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_code, message) = match &self {
            HerdError::Authentication(_) => ("AuthenticationRequired", self.to_string()),
            HerdError::Validation(_) => ("InvalidRequest", self.to_string()),
            HerdError::NotFound(_) => ("NotFound", self.to_string()),
            HerdError::PayloadTooLarge(_) => ("PayloadTooLarge", self.to_string()),
            HerdError::Storage(_) => ("StorageError", self.to_string()),
            HerdError::Aggregation(_) => ("AggregationError", self.to_string()),
            HerdError::Database(_) | HerdError::Internal(_) | HerdError::Io(_) => (
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
            HerdError::Config(_) => ("InternalServerError", self.to_string()),
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for HerdWatch operations
pub type HerdResult<T> = Result<T, HerdError>;
