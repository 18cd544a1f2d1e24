//! Object store access for the file processing pipeline.
//!
//! Files arrive in the pipeline as `(library, path)` pairs. A library is a
//! logical namespace (a bucket, a directory on an NFS share, ...) served by a
//! [`StorageBackend`]. The [`Librarian`] maps library names to backends and
//! exposes the three operations the pipeline needs: download an object to a
//! local path, upload a replacement, and delete an object.

pub mod backend;
pub mod error;
mod librarian;
mod path;

pub use crate::backend::{StorageBackend, UploadMeta};
pub use crate::librarian::Librarian;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
