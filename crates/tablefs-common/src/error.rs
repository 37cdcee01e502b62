//! Error types for TableFS
//!
//! Every public operation either fully succeeds or fails with one of these
//! variants. The core never retries on its own.

use crate::types::{FileNameError, ModeError, OpenMode, PartNo};
use thiserror::Error;

/// Common result type for TableFS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for TableFS
#[derive(Debug, Error)]
pub enum Error {
    // Lookup errors
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("cannot read parts {start}..={end} of {filename}: {found} of {expected} present")]
    PartsNotFound {
        filename: String,
        start: PartNo,
        end: PartNo,
        expected: u64,
        found: u64,
    },

    // Mode errors
    #[error("invalid mode {mode:?}: {source}")]
    InvalidMode {
        mode: String,
        #[source]
        source: ModeError,
    },

    #[error("cannot write to {filename}, mode is {mode}")]
    WriteNotAllowed { filename: String, mode: OpenMode },

    #[error("cannot read from {filename}, mode is {mode}")]
    ReadNotAllowed { filename: String, mode: OpenMode },

    // Row store errors
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("invalid filename: {0}")]
    InvalidFilename(#[from] FileNameError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("worker task failed: {0}")]
    TaskFailed(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create an invalid mode error for the given mode string
    pub fn invalid_mode(mode: impl Into<String>, source: ModeError) -> Self {
        Self::InvalidMode {
            mode: mode.into(),
            source,
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Check if this is a not found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound(_) | Self::PartsNotFound { .. })
    }

    /// Check if the caller may retry the operation
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::TaskFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_not_found() {
        assert!(Error::FileNotFound("a".into()).is_not_found());
        assert!(
            Error::PartsNotFound {
                filename: "a".into(),
                start: 0,
                end: 9,
                expected: 10,
                found: 3,
            }
            .is_not_found()
        );
        assert!(!Error::IntegrityViolation("dup".into()).is_not_found());
    }

    #[test]
    fn test_error_retryable() {
        assert!(Error::storage("disk").is_retryable());
        assert!(Error::TaskFailed("panic".into()).is_retryable());
        assert!(!Error::FileNotFound("a".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = Error::invalid_mode("x", ModeError::UnknownMarker('x'));
        assert_eq!(err.to_string(), "invalid mode \"x\": unknown mode marker 'x'");

        let err = Error::WriteNotAllowed {
            filename: "f".into(),
            mode: OpenMode::READ,
        };
        assert_eq!(err.to_string(), "cannot write to f, mode is r");
    }
}
