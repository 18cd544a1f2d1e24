use crate::BackendHandle;
use crate::backend::UploadMeta;
use crate::error::{ErrorKind, Result};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tracing::instrument;

/// Registry of libraries and the backends that serve them.
///
/// Every operation is addressed by `(library, path)`, the same pair that
/// identifies a file everywhere else in the pipeline. Each operation is
/// independently fallible; nothing here retries.
///
/// # Examples
///
/// ```no_run
/// use maw_storage::{Librarian, backend::LocalBackend};
/// use std::{path::Path, sync::Arc};
///
/// # async fn example() -> maw_storage::error::Result<()> {
/// let librarian = Librarian::new()
///     .with_library("docs", Arc::new(LocalBackend::new("docs", "/srv/docs")?));
/// let bytes = librarian.download("docs", Path::new("/a.txt"), Path::new("/tmp/a.txt")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Librarian {
    libraries: HashMap<String, BackendHandle>,
}
impl Librarian {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library(mut self, name: impl Into<String>, backend: BackendHandle) -> Self {
        self.insert(name, backend);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, backend: BackendHandle) {
        self.libraries.insert(name.into(), backend);
    }

    pub fn contains(&self, library: &str) -> bool {
        self.libraries.contains_key(library)
    }

    fn backend(&self, library: &str) -> Result<&BackendHandle> {
        self.libraries.get(library).ok_or_else(|| exn::Exn::from(ErrorKind::UnknownLibrary(library.to_string())))
    }

    /// Stream an object into a local file, returning the number of bytes
    /// written. The destination is created (or truncated).
    #[instrument(skip(self), fields(dest = %dest.display()))]
    pub async fn download(&self, library: &str, path: &Path, dest: &Path) -> Result<u64> {
        let backend = self.backend(library)?;
        let mut reader = backend.reader(path).await?;
        let mut file = fs::File::create(dest).await.map_err(ErrorKind::Io)?;
        let bytes = tokio::io::copy(&mut reader, &mut file).await.map_err(ErrorKind::Io)?;
        file.sync_all().await.map_err(ErrorKind::Io)?;
        tracing::debug!(backend = backend.name(), bytes, "Downloaded object");
        Ok(bytes)
    }

    /// Upload a local file as the object at `(library, path)`, replacing
    /// whatever was there.
    #[instrument(skip(self, meta), fields(source = %source.display(), mime = %meta.mime_type))]
    pub async fn upload(&self, library: &str, path: &Path, source: &Path, meta: &UploadMeta) -> Result<()> {
        self.backend(library)?.upload(path, source, meta).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, library: &str, path: &Path) -> Result<()> {
        self.backend(library)?.delete(path).await
    }
}
