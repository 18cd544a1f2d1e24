//! Graph Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A graph store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for graph store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// The operation needs an existing file node.
    #[display("file not found: ({_0}, {_1})")]
    FileNotFound(#[error(not(source))] String, #[error(not(source))] String),
    /// A stored value could not be converted to or from its model.
    #[display("invalid graph data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// SQLite surfaces lock contention as a plain database error, so that is
    /// the only category worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ErrorKind::FileNotFound("docs".to_string(), "a.txt".to_string());
        assert_eq!(err.to_string(), "file not found: (docs, a.txt)");
        assert_eq!(ErrorKind::InvalidData("uuid").to_string(), "invalid graph data: uuid");
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorKind::Database.is_retryable());
        assert!(!ErrorKind::Migration.is_retryable());
        assert!(!ErrorKind::InvalidData("size").is_retryable());
    }
}
