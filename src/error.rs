//! Error types and handling infrastructure for logsift.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! custom error types. The binary layers `anyhow` on top for context.
//!
//! Cancellation is not an error: a cancelled operation
//! completes normally with its `cancelled` flag set.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for logsift operations.
#[derive(Error, Debug)]
pub enum LogsiftError {
    /// File system related errors (read failure, truncated file, etc.)
    #[error("File operation failed: {message}")]
    FileError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// File not found specifically (common case for user feedback)
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Path exists but is not a regular file
    #[error("Path is not a regular file: {path}")]
    NotAFile { path: PathBuf },

    /// Permission denied accessing file
    #[error("Permission denied accessing file: {path}")]
    PermissionDenied { path: PathBuf },

    /// Requested line is not part of the index
    #[error("Line {line} out of range (file has {count} lines)")]
    LineOutOfRange { line: u64, count: u64 },

    /// Search pattern could not be compiled
    #[error("Invalid search pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Another load/search/export is still running
    #[error("Another operation is already in progress")]
    OperationInProgress,

    /// Operation requires a bound file
    #[error("No file is loaded")]
    NotLoaded,

    /// Caller supplied an argument the engine cannot act on
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Configuration related errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Generic error for cases not covered by specific variants
    #[error("Operation failed: {message}")]
    Other { message: String },
}

/// Standard Result type for logsift operations.
pub type Result<T> = std::result::Result<T, LogsiftError>;

impl LogsiftError {
    /// Create a FileError from an io::Error with additional context
    pub fn file_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError {
            message: message.into(),
            source,
        }
    }

    /// Create an InvalidPattern error for a pattern that failed to compile
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidArgument error with a descriptive message
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a ConfigError with a descriptive message
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a generic Other error with a descriptive message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Map an io::Error raised while touching `path` onto the most specific variant
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::FileError {
                message: format!("I/O failure on {}", path.display()),
                source: err,
            },
        }
    }
}

// Automatic conversion from io::Error to LogsiftError
impl From<std::io::Error> for LogsiftError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileError {
                message: "File not found".to_string(),
                source: err,
            },
            std::io::ErrorKind::PermissionDenied => Self::FileError {
                message: "Permission denied".to_string(),
                source: err,
            },
            _ => Self::FileError {
                message: "IO operation failed".to_string(),
                source: err,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_display_messages() {
        let path = PathBuf::from("/test/file.log");

        let file_not_found = LogsiftError::FileNotFound { path: path.clone() };
        assert_eq!(file_not_found.to_string(), "File not found: /test/file.log");

        let out_of_range = LogsiftError::LineOutOfRange { line: 7, count: 3 };
        assert_eq!(
            out_of_range.to_string(),
            "Line 7 out of range (file has 3 lines)"
        );

        let pattern = LogsiftError::invalid_pattern("(", "unclosed group");
        assert_eq!(
            pattern.to_string(),
            "Invalid search pattern '(': unclosed group"
        );
    }

    #[test]
    fn test_from_io_picks_specific_variant() {
        let path = PathBuf::from("/var/log/missing.log");

        let err = LogsiftError::from_io(
            &path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, LogsiftError::FileNotFound { .. }));

        let err = LogsiftError::from_io(
            &path,
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert!(matches!(err, LogsiftError::PermissionDenied { .. }));

        let err = LogsiftError::from_io(
            &path,
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short"),
        );
        assert!(matches!(err, LogsiftError::FileError { .. }));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: LogsiftError = io_err.into();

        match err {
            LogsiftError::FileError { message, .. } => {
                assert_eq!(message, "File not found");
            }
            _ => panic!("Expected FileError variant"),
        }
    }
}
