//! Error types for Quarry
//!
//! User-query edge cases (no tokens, nothing matched) are not errors: they
//! produce empty results. Everything in this module is a hard failure that
//! is surfaced to the caller of the search operation unchanged.
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for Quarry operations
pub type QuarryResult<T> = std::result::Result<T, QuarryError>;

/// Error types for query construction, retrieval and reranking
#[derive(Debug, Error)]
pub enum QuarryError {
    /// The query mode string is not one of the recognized modes
    #[error("query mode '{0}' is not supported")]
    UnsupportedQueryMode(String),

    /// A zero-length term was given where one is required
    #[error("query term must not be empty")]
    EmptyQueryTerm,

    /// The index reader could not be opened or accessed
    #[error("index unavailable: {reason}")]
    IndexUnavailable {
        /// Why the index could not be used
        reason: String,
    },

    /// A reranker cascade stage failed
    #[error("reranker stage '{stage}' failed: {source}")]
    StageFailure {
        /// Stage identity (`<position>:<name>`)
        stage: String,
        /// Underlying failure
        #[source]
        source: Box<QuarryError>,
    },

    /// An argument violated a precondition
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be read, parsed or validated
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl QuarryError {
    /// Create an `IndexUnavailable` error
    pub fn index_unavailable(reason: impl Into<String>) -> Self {
        QuarryError::IndexUnavailable {
            reason: reason.into(),
        }
    }

    /// Create an `InvalidArgument` error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        QuarryError::InvalidArgument(msg.into())
    }

    /// Create a `Config` error
    pub fn config(msg: impl Into<String>) -> Self {
        QuarryError::Config(msg.into())
    }

    /// Wrap a failure raised inside a reranker stage
    pub fn stage_failure(stage: impl Into<String>, source: QuarryError) -> Self {
        QuarryError::StageFailure {
            stage: stage.into(),
            source: Box::new(source),
        }
    }

    /// True if this error (or the stage failure it wraps) is `IndexUnavailable`
    pub fn is_index_unavailable(&self) -> bool {
        match self {
            QuarryError::IndexUnavailable { .. } => true,
            QuarryError::StageFailure { source, .. } => source.is_index_unavailable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display_unsupported_mode() {
        let err = QuarryError::UnsupportedQueryMode("wildcard".to_string());
        let msg = err.to_string();
        assert!(msg.contains("wildcard"));
        assert!(msg.contains("not supported"));
    }

    #[test]
    fn test_error_display_empty_term() {
        let err = QuarryError::EmptyQueryTerm;
        assert_eq!(err.to_string(), "query term must not be empty");
    }

    #[test]
    fn test_error_display_index_unavailable() {
        let err = QuarryError::index_unavailable("reader closed");
        let msg = err.to_string();
        assert!(msg.contains("index unavailable"));
        assert!(msg.contains("reader closed"));
    }

    #[test]
    fn test_stage_failure_carries_stage_and_source() {
        let err = QuarryError::stage_failure("0:rm3", QuarryError::index_unavailable("closed"));
        let msg = err.to_string();
        assert!(msg.contains("0:rm3"));
        assert!(msg.contains("closed"));
        assert!(err.source().is_some());
        assert!(err.is_index_unavailable());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: QuarryError = io_err.into();
        assert!(matches!(err, QuarryError::Io(_)));
        assert!(!err.is_index_unavailable());
    }

    #[test]
    fn test_error_display_invalid_argument() {
        let err = QuarryError::invalid_argument("rerank_cutoff 5 < hits 10");
        let msg = err.to_string();
        assert!(msg.contains("invalid argument"));
        assert!(msg.contains("rerank_cutoff"));
    }
}
