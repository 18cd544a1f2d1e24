//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface over the places libraries live (local filesystem, S3-compatible
//! services, ...). The pipeline only ever needs to stream an object out, put
//! a replacement back, and delete objects, so that's all the trait offers.

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Owned, streaming reader over an object's bytes.
pub type BoxAsyncRead = Pin<Box<dyn AsyncRead + Send + 'static>>;

/// Metadata attached to an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadMeta {
    /// MIME type stored alongside the object (`Content-Type` on S3).
    pub mime_type: String,
    /// Display name of the file, usually the last segment of its key.
    pub file_name: String,
}
impl UploadMeta {
    pub fn new(mime_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }
}

/// Unified interface for storage backends.
///
/// # Path Handling
/// All paths are object keys relative to the storage root and must be
/// validated using [`validate_path`](crate::validate_path) before use.
/// Implementations enforce this validation.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use maw_storage::{backend::StorageBackend, error::Result};
///
/// async fn copy_to_disk(backend: &dyn StorageBackend, key: &Path, dest: &Path) -> Result<u64> {
///     let mut reader = backend.reader(key).await?;
///     let mut file = tokio::fs::File::create(dest).await.map_err(maw_storage::error::ErrorKind::Io)?;
///     Ok(tokio::io::copy(&mut reader, &mut file).await.map_err(maw_storage::error::ErrorKind::Io)?)
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (name taken from the configuration
    /// object key). Used for logging only.
    fn name(&self) -> &str;

    /// Open an object for streaming reads.
    ///
    /// The async setup (opening the file, issuing the request) happens before
    /// returning; the object's bytes are pulled lazily through the reader.
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn reader(&self, path: &Path) -> Result<BoxAsyncRead>;

    /// Upload the contents of a local file, replacing any existing object.
    ///
    /// # Notes
    /// - Implementations should create parent directories as needed.
    /// - The local file is streamed, never loaded into memory at once (the
    ///   mock backend being the exception).
    async fn upload(&self, path: &Path, source: &Path, meta: &UploadMeta) -> Result<()>;

    /// Delete an object.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the backend
    /// can tell that the object did not exist (S3 can't, and won't).
    async fn delete(&self, path: &Path) -> Result<()>;
}
