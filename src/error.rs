//! Error types for episode-ingest
//!
//! This module provides the error handling for the library:
//! - [`Error`], the crate-wide error used by the catalog, queue and API layers
//! - [`IngestError`], the per-task failure taxonomy of the ingestion pipeline
//! - HTTP status code mapping and structured JSON error bodies for the API
//!
//! Push notification failures are deliberately absent here: they live in
//! [`crate::notify::NotificationError`] and never reach a task's result.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for episode-ingest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for episode-ingest
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "S3_BUCKET")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A pipeline stage failed for one task
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Object storage call failed
    #[error("object storage error: {0}")]
    Storage(String),

    /// Request body or parameters failed validation
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new submissions
    #[error("shutdown in progress: not accepting new submissions")]
    ShuttingDown,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate primary key)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Failure of a single ingestion task.
///
/// Each variant terminates the task that produced it and nothing else.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The source URL could not be parsed
    #[error("invalid source URL {url}: {reason}")]
    InvalidUrl {
        /// The offending URL as submitted
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// A produced artifact could not be found on local storage
    #[error("artifact {path} cannot be resolved: {reason}")]
    InvalidLocalPath {
        /// Where the artifact was expected
        path: PathBuf,
        /// The resolution failure
        reason: String,
    },

    /// The catalog already holds a record for this media identifier
    #[error("episode {id} already exists")]
    AlreadyExists {
        /// The duplicate media identifier
        id: String,
    },

    /// The external fetcher exited unsuccessfully or printed unparsable output
    #[error("fetch failed: {reason}")]
    FetchFailed {
        /// Short description of the failure
        reason: String,
        /// Captured stdout/stderr of the external process
        output: String,
    },

    /// The object store rejected an artifact upload
    #[error("upload of {key} failed: {reason}")]
    UploadFailed {
        /// Object key that failed
        key: String,
        /// Underlying storage error
        reason: String,
    },

    /// The catalog write failed, including uniqueness violations
    #[error("persisting episode {id} failed: {reason}")]
    PersistFailed {
        /// Media identifier of the record
        id: String,
        /// Underlying catalog error
        reason: String,
    },
}

impl IngestError {
    /// Machine-readable name used in logs and task events
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::InvalidUrl { .. } => "invalid_url",
            IngestError::InvalidLocalPath { .. } => "invalid_local_path",
            IngestError::AlreadyExists { .. } => "already_exists",
            IngestError::FetchFailed { .. } => "fetch_failed",
            IngestError::UploadFailed { .. } => "upload_failed",
            IngestError::PersistFailed { .. } => "persist_failed",
        }
    }
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "not found: episode abc123"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "invalid_request")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("invalid_request", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidRequest(_) => 400,
            Error::Ingest(IngestError::InvalidUrl { .. }) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::Database(DatabaseError::NotFound(_)) => 404,

            // 409 Conflict
            Error::Ingest(IngestError::AlreadyExists { .. }) => 409,
            Error::Database(DatabaseError::ConstraintViolation(_)) => 409,

            // 422 Unprocessable Entity
            Error::Ingest(IngestError::InvalidLocalPath { .. }) => 422,

            // 502 Bad Gateway - External collaborators
            Error::Ingest(IngestError::FetchFailed { .. }) => 502,
            Error::Ingest(IngestError::UploadFailed { .. }) => 502,
            Error::Storage(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,

            // 500 Internal Server Error - Server-side issues
            Error::Ingest(IngestError::PersistFailed { .. }) => 500,
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(DatabaseError::NotFound(_)) => "not_found",
            Error::Database(DatabaseError::ConstraintViolation(_)) => "conflict",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Ingest(e) => e.kind(),
            Error::Storage(_) => "storage_error",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::ShuttingDown => "shutting_down",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Ingest(IngestError::AlreadyExists { id }) => Some(serde_json::json!({
                "episode_id": id,
            })),
            Error::Ingest(IngestError::InvalidUrl { url, .. }) => Some(serde_json::json!({
                "url": url,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
