//! # Error Types
//!
//! Custom error types for UAV Log Analyst using `thiserror`.
//!
//! The telemetry pipeline itself never fails; these variants only cover the
//! edges around it (configuration, upload parsing, sessions, report files).

use thiserror::Error;

/// Main error type for UAV Log Analyst
#[derive(Debug, Error)]
pub enum AnalystError {
    /// Upload body is not a usable telemetry document
    #[error("Invalid telemetry: {0}")]
    InvalidTelemetry(String),

    /// Session lookup failed
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// JSON encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for UAV Log Analyst
pub type Result<T> = std::result::Result<T, AnalystError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AnalystError::SessionNotFound("abc".to_string());
        assert_eq!(err.to_string(), "Session not found: abc");

        let err = AnalystError::InvalidTelemetry("root must be an object".to_string());
        assert_eq!(err.to_string(), "Invalid telemetry: root must be an object");
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: AnalystError = parse.unwrap_err().into();
        assert!(matches!(err, AnalystError::Json(_)));
    }
}
