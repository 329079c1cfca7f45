//! Error types for inspector operations
//!
//! Trace reconstruction itself is lenient: a malformed patch operation is
//! reported as an [`OpOutcome`](crate::patch::OpOutcome) rather than an error.
//! The errors in this module cover the hard failures around it:
//! - Serialized payloads that cannot be parsed at all
//! - Lookups of stages or requests that do not exist
//! - Strict-mode reconstruction, where malformed operations are rejected
//!
//! # Error Codes
//!
//! Each variant has a stable error code (e.g., `STAGE_NOT_FOUND`) that a
//! presentation layer can switch on, for example to show "no diff available"
//! instead of a raw message.
//!
//! # Example
//!
//! ```rust
//! use iopa_core::error::{InspectorError, ErrorCategory};
//!
//! fn describe(err: &InspectorError) -> &'static str {
//!     match err.category() {
//!         ErrorCategory::NotFound => "nothing selected",
//!         ErrorCategory::Decode => "payload could not be read",
//!         _ => "no diff available",
//!     }
//! }
//!
//! let err = InspectorError::StageNotFound { stage: "auth".to_string() };
//! assert_eq!(describe(&err), "nothing selected");
//! assert_eq!(err.error_code(), "STAGE_NOT_FOUND");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::patch::PatchError;

/// Result type alias for inspector operations
pub type Result<T> = std::result::Result<T, InspectorError>;

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Input is structurally valid JSON but violates the expected shape
    Validation,
    /// Referenced stage or request does not exist
    NotFound,
    /// Operation conflicts with existing state
    Conflict,
    /// Payload could not be decoded (JSON, base64, URL)
    Decode,
    /// Unexpected failure
    Internal,
}

/// Errors that can occur while inspecting traces and requests
#[derive(Error, Debug)]
pub enum InspectorError {
    // ═══════════════════════════════════════════════════════════════════════
    // Trace errors
    // ═══════════════════════════════════════════════════════════════════════

    /// Serialized trace does not have the `[[name, record], ...]` shape
    #[error("Invalid trace: {reason}. Expected an array of [stageName, record] pairs.")]
    InvalidTrace { reason: String },

    /// No stage with the given name or index
    #[error("Stage not found: '{stage}'")]
    StageNotFound { stage: String },

    /// Patch operation rejected in strict mode
    #[error("Malformed patch operation #{index} in {phase} delta: {source}")]
    MalformedPatch {
        phase: String,
        index: usize,
        #[source]
        source: PatchError,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Request context errors
    // ═══════════════════════════════════════════════════════════════════════

    /// Serialized request or reply is missing required fields
    #[error("Invalid context: {reason}")]
    InvalidContext { reason: String },

    /// A request with this id was already captured
    #[error("Duplicate request: '{id}' is already in the log")]
    DuplicateRequest { id: String },

    /// No request with this id in the log
    #[error("Request not found: '{id}'. The log may have been cleared.")]
    RequestNotFound { id: String },

    /// Body payload could not be decoded
    #[error("Failed to decode body (size: {size}): {reason}")]
    BodyDecode { size: usize, reason: String },

    /// Request URL could not be parsed
    #[error("Failed to parse url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Infrastructure errors
    // ═══════════════════════════════════════════════════════════════════════

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O operation failed
    #[error("IO error: {message}")]
    Io { message: String },
}

impl InspectorError {
    /// Returns the error category for grouping
    pub fn category(&self) -> ErrorCategory {
        match self {
            InspectorError::InvalidTrace { .. }
            | InspectorError::MalformedPatch { .. }
            | InspectorError::InvalidContext { .. } => ErrorCategory::Validation,

            InspectorError::StageNotFound { .. }
            | InspectorError::RequestNotFound { .. } => ErrorCategory::NotFound,

            InspectorError::DuplicateRequest { .. } => ErrorCategory::Conflict,

            InspectorError::BodyDecode { .. }
            | InspectorError::InvalidUrl { .. }
            | InspectorError::Json(_) => ErrorCategory::Decode,

            InspectorError::Io { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            InspectorError::InvalidTrace { .. } => "INVALID_TRACE",
            InspectorError::StageNotFound { .. } => "STAGE_NOT_FOUND",
            InspectorError::MalformedPatch { .. } => "MALFORMED_PATCH",
            InspectorError::InvalidContext { .. } => "INVALID_CONTEXT",
            InspectorError::DuplicateRequest { .. } => "DUPLICATE_REQUEST",
            InspectorError::RequestNotFound { .. } => "REQUEST_NOT_FOUND",
            InspectorError::BodyDecode { .. } => "BODY_DECODE_ERROR",
            InspectorError::InvalidUrl { .. } => "INVALID_URL",
            InspectorError::Json(_) => "JSON_ERROR",
            InspectorError::Io { .. } => "IO_ERROR",
        }
    }

    /// Converts this error to a JSON-serializable response object
    ///
    /// ```json
    /// {
    ///   "error": {
    ///     "code": "STAGE_NOT_FOUND",
    ///     "message": "Stage not found: 'auth'",
    ///     "category": "not_found"
    ///   }
    /// }
    /// ```
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                category: self.category(),
            },
        }
    }
}

impl From<std::io::Error> for InspectorError {
    fn from(err: std::io::Error) -> Self {
        InspectorError::Io {
            message: err.to_string(),
        }
    }
}

/// JSON-serializable error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail for JSON responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable error code (e.g., "STAGE_NOT_FOUND")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Error category
    pub category: ErrorCategory,
}
