//! Pipeline Error Types
//!
//! Each kind names the stage of event handling that failed; the error tree
//! underneath carries whatever the capability reported.

use derive_more::{Display, Error};

/// A pipeline error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The message matches no known schema. Dropped, never retried.
    #[display("unrecognized message format: {_0}")]
    UnrecognizedMessage(#[error(not(source))] String),
    #[display("could not prepare scratch space")]
    Scratch,
    /// Content could not be downloaded (or a repaired file uploaded).
    #[display("content acquisition failed")]
    Acquisition,
    /// The integrity check could not be carried out.
    #[display("integrity check failed to run")]
    Integrity,
    /// The repair tool could not be started.
    #[display("repair failed to run")]
    Repair,
    #[display("fingerprinting failed")]
    Fingerprint,
    /// A graph store read or write failed.
    #[display("persistence failed")]
    Persistence,
    #[display("publishing to {_0} failed")]
    Publish(#[error(not(source))] String),
}

impl ErrorKind {
    /// Short stage name, for structured logs.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::UnrecognizedMessage(_) => "classify",
            Self::Scratch => "scratch",
            Self::Acquisition => "acquire",
            Self::Integrity | Self::Repair => "integrity",
            Self::Fingerprint => "fingerprint",
            Self::Persistence => "persist",
            Self::Publish(_) => "publish",
        }
    }

    /// Returns `true` if redelivering the message might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Acquisition | Self::Persistence | Self::Publish(_) | Self::Scratch)
    }
}
