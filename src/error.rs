//! Error types for the fetch-and-rank pipeline.
//!
//! # Error Taxonomy
//!
//! Every error belongs to exactly one [`ErrorKind`]:
//!
//! | Kind | Variants | When |
//! |------|----------|------|
//! | `Configuration` | `ConfigError` | Invalid limit, capacity, or tuning value, before the pipeline starts |
//! | `Fetch` | `ApiError`, `NetworkError`, `Timeout`, `SerializationError` | A single page fetch failed |
//! | `Cancellation` | `Cancelled` | The run's cancellation signal fired while a task was waiting |
//! | `Internal` | `TaskFailed` | A spawned task panicked or was aborted |
//!
//! # No Retries
//!
//! Fetch errors are terminal. The first error of a run cancels every sibling
//! task and is returned to the caller; no partial ranking is ever produced.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, ArticlesError>;

// ============================================================================
// Error Kind
// ============================================================================

/// Coarse classification of an [`ArticlesError`].
///
/// `Fetch` and `Cancellation` are both fatal to a run; the distinction only
/// matters for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid input detected before any work started.
    Configuration,
    /// An upstream page fetch failed.
    Fetch,
    /// The run was cancelled.
    Cancellation,
    /// A background task failed unexpectedly.
    Internal,
}

// ============================================================================
// Articles Error
// ============================================================================

/// Errors that can occur while fetching and ranking articles.
#[derive(Debug, Error)]
pub enum ArticlesError {
    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Upstream answered with a non-success status.
    #[error("Unexpected status {status} for page {page}")]
    ApiError { page: u32, status: u16 },

    /// Transport-level failure.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out")]
    Timeout,

    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The run was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// A spawned task panicked or was aborted.
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl From<reqwest::Error> for ArticlesError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ArticlesError::Timeout
        } else if err.is_connect() {
            ArticlesError::NetworkError(format!("Connection failed: {}", err))
        } else {
            ArticlesError::NetworkError(err.to_string())
        }
    }
}

impl From<tokio::task::JoinError> for ArticlesError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            ArticlesError::TaskFailed("task aborted".to_string())
        } else {
            ArticlesError::TaskFailed(format!("task panicked: {}", err))
        }
    }
}

impl ArticlesError {
    /// Classify this error.
    ///
    /// # Example
    ///
    /// ```
    /// use top_articles::{ArticlesError, ErrorKind};
    ///
    /// let error = ArticlesError::ApiError { page: 3, status: 503 };
    /// assert_eq!(error.kind(), ErrorKind::Fetch);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigError(_) => ErrorKind::Configuration,
            Self::ApiError { .. }
            | Self::NetworkError(_)
            | Self::Timeout
            | Self::SerializationError(_) => ErrorKind::Fetch,
            Self::Cancelled => ErrorKind::Cancellation,
            Self::TaskFailed(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error is the cancellation signal surfacing.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Get a user-friendly description of the error.
    pub fn user_description(&self) -> String {
        match self {
            Self::ConfigError(msg) => format!("Invalid configuration: {}.", msg),
            Self::ApiError { page, status } => format!(
                "The articles API rejected page {} with status {}.",
                page, status
            ),
            Self::NetworkError(_) => {
                "Unable to reach the articles API. Check your network connection.".to_string()
            }
            Self::Timeout => "Request timed out. The articles API may be overloaded.".to_string(),
            Self::SerializationError(_) => {
                "Failed to parse the articles API response.".to_string()
            }
            Self::Cancelled => "The run was cancelled before it completed.".to_string(),
            Self::TaskFailed(msg) => format!("An internal task failed: {}", msg),
        }
    }
}
