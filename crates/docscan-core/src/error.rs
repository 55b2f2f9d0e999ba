//! Error types module
//!
//! Every failure the client can hit is unified under [`AppError`]. The variants
//! follow the four categories the front end distinguishes: local validation
//! failures, transport failures, server-reported business errors and auth
//! errors. Nothing here is fatal; callers render the error and carry on.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like timeouts
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be presented to the user.
pub trait ErrorMetadata {
    /// HTTP status the server answered with, when the error came from a response
    fn http_status_code(&self) -> Option<u16>;

    /// Machine-readable error code (e.g., "TIMEOUT")
    fn error_code(&self) -> &'static str;

    /// Whether repeating the same action may succeed
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
    #[error("{0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("Request cancelled")]
    Cancelled,

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("{message}")]
    Unauthorized { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Storage(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decode(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        AppError::Validation(_) => (
            "VALIDATION_ERROR",
            false,
            Some("Fix the highlighted input and try again"),
            LogLevel::Debug,
        ),
        AppError::Network(_) => (
            "NETWORK_ERROR",
            true,
            Some("Check your connection and retry"),
            LogLevel::Warn,
        ),
        AppError::Timeout { .. } => (
            "TIMEOUT",
            true,
            Some("Retry after a short delay"),
            LogLevel::Warn,
        ),
        AppError::Cancelled => ("CANCELLED", true, None, LogLevel::Debug),
        AppError::Server { .. } => ("SERVER_ERROR", false, None, LogLevel::Warn),
        AppError::Unauthorized { .. } => (
            "UNAUTHORIZED",
            false,
            Some("Log in again"),
            LogLevel::Debug,
        ),
        AppError::Decode(_) => (
            "DECODE_ERROR",
            false,
            Some("Contact support if this error persists"),
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            "STORAGE_ERROR",
            true,
            Some("Check permissions on the session file"),
            LogLevel::Error,
        ),
        AppError::Config(_) => (
            "CONFIG_ERROR",
            false,
            Some("Check environment variables"),
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Build the error for a non-2xx response. Only 401 (missing or expired
    /// token) is an auth error; 403 is a permission answer for a valid session.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => AppError::Unauthorized { status, message },
            _ => AppError::Server { status, message },
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, AppError::Unauthorized { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::Timeout { .. })
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> Option<u16> {
        match self {
            AppError::Server { status, .. } | AppError::Unauthorized { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            // Transport details stay in the logs.
            AppError::Network(_) => "Network error: the server could not be reached".to_string(),
            AppError::Timeout { .. } => self.to_string(),
            AppError::Cancelled => self.to_string(),
            AppError::Server { message, .. } => message.clone(),
            AppError::Unauthorized { message, .. } => message.clone(),
            AppError::Decode(_) => "Unexpected response shape.".to_string(),
            AppError::Storage(_) => "Failed to access the saved session".to_string(),
            AppError::Config(msg) => msg.clone(),
        }
    }
}
