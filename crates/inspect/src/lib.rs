//! Everything the pipeline learns about a file's bytes.
//!
//! - [`fingerprint`]: streaming SHA-256 content digest.
//! - [`classify`]: MIME type resolution (content sniffing, then file name).
//! - [`integrity`]: format validators and repairers, backed by external tools.
//! - [`tools`]: bounded subprocess invocation and the exit-status policy that
//!   turns a status code into a [`Verdict`].

pub mod classify;
pub mod error;
pub mod fingerprint;
pub mod integrity;
pub mod tools;

pub use crate::classify::{Classification, FileSniffer, MimeSniffer, UNKNOWN_MIME};
pub use crate::fingerprint::{Fingerprint, Fingerprinter};
pub use crate::integrity::{IntegrityChecker, Repairer, ToolChecker, ToolRepairer};
pub use crate::tools::{ExitPolicy, Tool, ToolOutput, Verdict};
