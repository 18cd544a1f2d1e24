//! Inspection Error Types

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::time::Duration;

/// An inspection error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for inspection operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The content stream could not be read to the end.
    #[display("failed to read content")]
    Read(IoError),
    /// The program could not be found on `PATH`.
    #[display("tool not found: {_0}")]
    ToolNotFound(#[error(not(source))] String),
    /// The program was found but could not be started.
    #[display("failed to launch {_0}")]
    Launch(#[error(not(source))] String),
    /// The program started, but waiting for it to finish failed.
    #[display("lost track of {_0} while it was running")]
    Wait(#[error(not(source))] String),
    /// The program ran past its time limit and was killed.
    #[display("{program} timed out after {}s", limit.as_secs_f32())]
    Timeout { program: String, limit: Duration },
    /// The program exited cleanly but didn't produce what it promised.
    #[display("{_0} produced no usable output")]
    NoOutput(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Read(_))
    }

    /// Returns `true` if the program never got to run at all.
    pub fn never_started(&self) -> bool {
        matches!(self, Self::ToolNotFound(_) | Self::Launch(_))
    }
}

impl From<IoError> for ErrorKind {
    fn from(e: IoError) -> Self {
        Self::Read(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = ErrorKind::Timeout { program: "qpdf".to_string(), limit: Duration::from_millis(1500) };
        assert_eq!(err.to_string(), "qpdf timed out after 1.5s");
        assert!(err.is_retryable());
        assert!(!ErrorKind::Launch("qpdf".to_string()).is_retryable());
    }

    #[test]
    fn test_never_started() {
        assert!(ErrorKind::Launch("qpdf".to_string()).never_started());
        assert!(ErrorKind::ToolNotFound("qpdf".to_string()).never_started());
        assert!(!ErrorKind::Wait("qpdf".to_string()).never_started());
        let timeout = ErrorKind::Timeout { program: "qpdf".to_string(), limit: Duration::from_secs(1) };
        assert!(!timeout.never_started());
    }
}
