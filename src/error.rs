/// Error types for projdex
///
/// This module defines all possible errors that can occur in the application.
/// Uses thiserror for ergonomic error handling.

use thiserror::Error;

/// Main error type for projdex operations
#[derive(Error, Debug)]
pub enum ProjdexError {
    /// Store-related errors
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// I/O errors (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Git-related errors
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configured scan root is missing or unreadable
    #[error("Scan root unavailable: {0}")]
    RootUnavailable(String),

    /// An edit targeted a path the store has never seen
    #[error("No project recorded for path: {0}")]
    UnknownProject(String),

    /// A status string that isn't one of active/hold/archived
    #[error("Invalid project status: {0}")]
    InvalidStatus(String),

    /// A second reconciliation was requested while one was running
    #[error("A scan is already in progress")]
    ScanInProgress,

    /// The scan was cancelled before its results were committed
    #[error("Scan cancelled")]
    ScanCancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for projdex operations
pub type Result<T> = std::result::Result<T, ProjdexError>;

/// Convert ProjdexError to a user-friendly error message
impl ProjdexError {
    pub fn user_message(&self) -> String {
        match self {
            ProjdexError::Store(e) => {
                format!("Store error occurred. Please try again. Details: {}", e)
            }
            ProjdexError::Io(e) => {
                format!("File system error. Check permissions. Details: {}", e)
            }
            ProjdexError::Git(e) => {
                format!("Git operation failed. Details: {}", e)
            }
            ProjdexError::Serialization(e) => {
                format!("Data format error: {}", e)
            }
            ProjdexError::RootUnavailable(root) => {
                format!("Cannot read scan root '{}'. Is the path correct?", root)
            }
            ProjdexError::UnknownProject(path) => {
                format!("No project recorded for '{}'. Run a refresh first?", path)
            }
            ProjdexError::InvalidStatus(s) => {
                format!("'{}' is not a status. Use active, hold or archived.", s)
            }
            ProjdexError::ScanInProgress => {
                "A scan is already running. Wait for it to finish.".to_string()
            }
            ProjdexError::ScanCancelled => "Scan cancelled before commit.".to_string(),
            ProjdexError::Config(msg) => {
                format!("Configuration issue: {}", msg)
            }
            ProjdexError::Generic(msg) => msg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_user_messages() {
        let err = ProjdexError::UnknownProject("/tmp/ghost".to_string());
        assert!(err.user_message().contains("/tmp/ghost"));

        let err = ProjdexError::ScanInProgress;
        assert!(err.user_message().contains("already running"));
    }

    #[test]
    fn test_error_display() {
        let err = ProjdexError::InvalidStatus("paused".to_string());
        let display = format!("{}", err);
        assert!(display.contains("Invalid project status"));
    }
}
