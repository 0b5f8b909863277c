//! Error types for Tagscope core operations.
//!
//! This module defines well-structured error types using `thiserror` for
//! library-level errors, while higher-level code can use `anyhow` for
//! convenient error handling.

use thiserror::Error;

/// Result type alias using TagScopeError
pub type Result<T> = std::result::Result<T, TagScopeError>;

/// Core error types for Tagscope operations.
///
/// Parse errors reach the caller unchanged. Store errors are normally
/// absorbed by the evaluator and reported as [`LookupFailure`]s, so a caller
/// only sees them when talking to a store directly.
///
/// [`LookupFailure`]: crate::evaluator::LookupFailure
#[derive(Error, Debug)]
pub enum TagScopeError {
    // === Query Errors ===
    /// The query text could not be parsed
    #[error("syntax error at byte {position}: {message}")]
    Syntax { message: String, position: usize },

    /// Evaluation was abandoned by its cancellation token
    #[error("evaluation cancelled")]
    Cancelled,

    // === Store Errors ===
    /// A single store lookup failed
    #[error("lookup failed: {lookup}: {reason}")]
    Lookup { lookup: String, reason: String },

    /// The backing database reported an error
    #[error("storage error: {0}")]
    Storage(String),

    // === Configuration Errors ===
    /// Configuration file parsing failed
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    // === I/O Errors ===
    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TagScopeError {
    /// Create a syntax error at the given byte offset
    pub fn syntax(message: impl Into<String>, position: usize) -> Self {
        TagScopeError::Syntax {
            message: message.into(),
            position,
        }
    }

    /// Create a lookup error
    pub fn lookup(lookup: impl Into<String>, reason: impl Into<String>) -> Self {
        TagScopeError::Lookup {
            lookup: lookup.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error came from the query text itself
    pub fn is_syntax(&self) -> bool {
        matches!(self, TagScopeError::Syntax { .. })
    }

    /// Byte offset into the query text, for syntax errors
    pub fn position(&self) -> Option<usize> {
        match self {
            TagScopeError::Syntax { position, .. } => Some(*position),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for TagScopeError {
    fn from(err: rusqlite::Error) -> Self {
        TagScopeError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = TagScopeError::syntax("expected operand after AND", 7);
        assert!(err.is_syntax());
        assert_eq!(err.position(), Some(7));
        assert_eq!(
            err.to_string(),
            "syntax error at byte 7: expected operand after AND"
        );
    }

    #[test]
    fn test_lookup_error_display() {
        let err = TagScopeError::lookup("tag 'cat'", "disk I/O error");
        assert!(!err.is_syntax());
        assert_eq!(err.position(), None);
        assert_eq!(err.to_string(), "lookup failed: tag 'cat': disk I/O error");
    }

    #[test]
    fn test_rusqlite_conversion() {
        let err: TagScopeError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, TagScopeError::Storage(_)));
    }
}
