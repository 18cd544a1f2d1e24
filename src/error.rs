//! Startup and transport errors of the `maw` binary.
//!
//! Per-message failures never get this far: the dispatcher logs and drops
//! them. What ends up here stops the process.

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("could not open library {_0}")]
    Library(#[error(not(source))] String),
    #[display("library {_0} is stored on S3, but S3 support was not compiled in (build with --features s3)")]
    S3Unsupported(#[error(not(source))] String),
    #[display("could not open the graph database")]
    Database,
    #[display("external tool unavailable: {_0}")]
    Tool(#[error(not(source))] &'static str),
    /// The message source could not be read.
    #[display("could not read messages")]
    Input,
    #[display("could not write output")]
    Output,
    #[display("could not inspect file")]
    Inspect,
}
