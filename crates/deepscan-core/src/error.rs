//! Error types module
//!
//! All client-side failures are unified under [`AppError`]. Local upload
//! rejections keep their own [`ValidationError`] type and are wrapped on the way
//! out; transport and payload problems from the analysis service end up in
//! [`AppError::Transport`] so the workflow can surface a single message.

use std::io;

use crate::validation::ValidationError;
use crate::workflow::WorkflowError;

/// Message shown when the analysis service failed without saying why.
pub const GENERIC_ANALYSIS_FAILURE: &str = "Analysis failed. Please try again.";

/// Message used when the service answered with a body we could not interpret.
pub const MALFORMED_RESPONSE: &str = "Malformed response from analysis service";

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like transport failures
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be presented to the user
pub trait ErrorMetadata {
    /// HTTP-style status code associated with the error
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "TRANSPORT_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether re-submitting the same request may succeed
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// User-facing message
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// Transport failure without an HTTP status (connection refused, timeout, ...).
    pub fn transport(message: impl Into<String>) -> Self {
        AppError::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Transport failure carrying the status code of a non-2xx response.
    pub fn transport_with_status(message: impl Into<String>, status: u16) -> Self {
        AppError::Transport {
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::debug!(error = %err, "Failed to decode service payload");
        AppError::transport(MALFORMED_RESPONSE)
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::AnalysisInProgress => AppError::Conflict(err.to_string()),
            WorkflowError::NoFileStaged
            | WorkflowError::UnsupportedType
            | WorkflowError::InvalidTransition { .. } => AppError::InvalidInput(err.to_string()),
        }
    }
}

/// Static metadata for each variant: (status, error_code, recoverable, suggested_action, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (u16, &'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        AppError::Validation(ValidationError::FileTooLarge { .. }) => (
            413,
            "FILE_TOO_LARGE",
            false,
            Some("Choose a smaller file"),
            LogLevel::Debug,
        ),
        AppError::Validation(_) => (
            415,
            "UNSUPPORTED_MEDIA",
            false,
            Some("Upload an image (PNG, JPG) or a video (MP4, MOV, AVI)"),
            LogLevel::Debug,
        ),
        AppError::Transport { status, .. } => (
            status.unwrap_or(502),
            "TRANSPORT_ERROR",
            true,
            Some("Check the analysis service and submit the file again"),
            LogLevel::Warn,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Go back and pick an analysis from the history"),
            LogLevel::Debug,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            LogLevel::Debug,
        ),
        AppError::Conflict(_) => (
            409,
            "ANALYSIS_IN_PROGRESS",
            true,
            Some("Wait for the current analysis to finish"),
            LogLevel::Debug,
        ),
        AppError::Cancelled => (499, "CANCELLED", true, None, LogLevel::Debug),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).4
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Validation(ref err) => err.to_string(),
            AppError::Transport { ref message, .. } => {
                if message.trim().is_empty() {
                    GENERIC_ANALYSIS_FAILURE.to_string()
                } else {
                    message.clone()
                }
            }
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::Conflict(ref msg) => msg.clone(),
            AppError::Cancelled => "Analysis cancelled".to_string(),
            AppError::Internal(_) => GENERIC_ANALYSIS_FAILURE.to_string(),
            AppError::InternalWithSource { .. } => GENERIC_ANALYSIS_FAILURE.to_string(),
        }
    }
}
