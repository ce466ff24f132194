//! Error types for wiki-export
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Render, Database, Config, etc.)
//! - HTTP status code mapping for the export-on-demand API
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for wiki-export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for wiki-export
///
/// Per-wiki failures (`Render`, `NotFound`, `Notify`) are contained by the
/// scheduler; on the export-on-demand path they propagate to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "publishemail")
        key: Option<String>,
    },

    /// No recipient address is configured for scheduled export
    #[error("no publish email configured")]
    NotConfigured,

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// The document renderer could not process the wiki
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Wiki, entry page, or other resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Requested export format is not one of the supported formats
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// Notification delivery failed
    #[error("notification failed: {0}")]
    Notify(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
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
}

/// Errors raised by a [`DocumentRenderer`](crate::export::DocumentRenderer)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// The renderer rejected a page
    #[error("page '{page}' rejected: {reason}")]
    Rejected {
        /// Title of the page that could not be rendered
        page: String,
        /// The reason given by the renderer
        reason: String,
    },

    /// The external rendering tool failed to run or exited unsuccessfully
    #[error("rendering tool failed: {0}")]
    Tool(String),

    /// The renderer did not finish within the configured time
    #[error("rendering timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The renderer cannot produce this format
    #[error("renderer cannot produce {0}")]
    Unsupported(String),
}

/// API error response format
///
/// Returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "not found: wiki 12"
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
    /// Machine-readable error code (e.g., "not_found", "render_failed")
    pub code: String,

    /// Human-readable error message, suitable for display to end users
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

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
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
            Error::UnsupportedFormat(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 409 Conflict - nothing to publish to
            Error::NotConfigured => 409,

            // 500 Internal Server Error - Server-side issues
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Serialization(_) => 500,

            // 501 Not Implemented - No renderer for the format
            Error::Render(RenderError::Unsupported(_)) => 501,

            // 504 Gateway Timeout
            Error::Render(RenderError::Timeout(_)) => 504,

            // 502 Bad Gateway - External collaborator errors
            Error::Render(_) => 502,
            Error::Notify(_) => 502,
            Error::Network(_) => 502,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::NotConfigured => "not_configured",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Render(e) => match e {
                RenderError::Rejected { .. } => "render_failed",
                RenderError::Tool(_) => "render_tool_failed",
                RenderError::Timeout(_) => "render_timeout",
                RenderError::Unsupported(_) => "render_unsupported",
            },
            Error::NotFound(_) => "not_found",
            Error::UnsupportedFormat(_) => "unsupported_format",
            Error::Notify(_) => "notify_failed",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            Error::Render(RenderError::Rejected { page, .. }) => Some(serde_json::json!({
                "page": page,
            })),
            Error::UnsupportedFormat(format) => Some(serde_json::json!({
                "format": format,
                "supported": ["pdf", "epub"],
            })),
            _ => None,
        };

        match details {
            Some(details) => ApiError::with_details(code, message, details),
            None => ApiError::new(code, message),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_maps_to_bad_gateway() {
        let error = Error::Render(RenderError::Rejected {
            page: "Cats".into(),
            reason: "bad table".into(),
        });
        assert_eq!(error.status_code(), 502);
        assert_eq!(error.error_code(), "render_failed");
    }

    #[test]
    fn test_render_timeout_maps_to_gateway_timeout() {
        let error = Error::Render(RenderError::Timeout(std::time::Duration::from_secs(5)));
        assert_eq!(error.status_code(), 504);
        assert_eq!(error.error_code(), "render_timeout");
    }

    #[test]
    fn test_not_found_and_not_configured() {
        assert_eq!(Error::NotFound("wiki 3".into()).status_code(), 404);
        assert_eq!(Error::NotConfigured.status_code(), 409);
        assert_eq!(Error::NotConfigured.error_code(), "not_configured");
    }

    #[test]
    fn test_api_error_carries_page_detail() {
        let error = Error::Render(RenderError::Rejected {
            page: "Dogs".into(),
            reason: "unbalanced markup".into(),
        });
        let api: ApiError = error.into();
        assert_eq!(api.error.code, "render_failed");
        assert_eq!(api.error.details.unwrap()["page"], "Dogs");
    }

    #[test]
    fn test_unsupported_format_lists_supported() {
        let api: ApiError = Error::UnsupportedFormat("docx".into()).into();
        let details = api.error.details.unwrap();
        assert_eq!(details["format"], "docx");
        assert_eq!(details["supported"][0], "pdf");
    }

    #[test]
    fn test_api_error_serialization_skips_empty_details() {
        let api = ApiError::new("not_found", "wiki 4 not found");
        let json = serde_json::to_string(&api).unwrap();
        assert!(json.contains("\"code\":\"not_found\""));
        assert!(!json.contains("details"));
    }
}
