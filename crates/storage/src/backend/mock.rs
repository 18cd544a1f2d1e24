//! In-memory storage backend for testing.

use crate::StorageBackend;
use crate::backend::{BoxAsyncRead, UploadMeta};
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[derive(Clone)]
struct Object {
    data: Vec<u8>,
    meta: Option<UploadMeta>,
}

/// In-memory storage backend for testing.
///
/// Objects are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Every upload and
/// delete is also recorded so tests can assert on what the pipeline did.
///
/// # Examples
///
/// Needs the `mock` feature outside of this crate's own tests.
///
/// ```ignore
/// use maw_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([("docs/a.txt", "hello")]);
/// assert_eq!(backend.contents(Path::new("docs/a.txt")).await.unwrap(), b"hello");
/// backend.delete(Path::new("docs/a.txt")).await?;
/// assert_eq!(backend.deleted().await, vec![Path::new("docs/a.txt").to_path_buf()]);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, Object>>,
    uploads: RwLock<Vec<PathBuf>>,
    deletes: RwLock<Vec<PathBuf>>,
    read_only: bool,
}

impl MockBackend {
    /// Create a mock backend pre-populated with objects.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, Object { data: data.into(), meta: None });
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            uploads: RwLock::new(Vec::new()),
            deletes: RwLock::new(Vec::new()),
            read_only: false,
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Refuse every upload with [`ErrorKind::PermissionDenied`]. Attempts are
    /// still recorded.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Current contents of an object, if it exists.
    pub async fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        let path = validate_path(path).ok()?;
        self.storage.read().await.get(&path).map(|o| o.data.clone())
    }

    /// Metadata of the last upload to an object, if it was uploaded.
    pub async fn upload_meta(&self, path: &Path) -> Option<UploadMeta> {
        let path = validate_path(path).ok()?;
        self.storage.read().await.get(&path).and_then(|o| o.meta.clone())
    }

    /// Keys passed to [`upload`](StorageBackend::upload), in call order.
    pub async fn uploaded(&self) -> Vec<PathBuf> {
        self.uploads.read().await.clone()
    }

    /// Keys passed to [`delete`](StorageBackend::delete), in call order
    /// (including ones that didn't exist).
    pub async fn deleted(&self) -> Vec<PathBuf> {
        self.deletes.read().await.clone()
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn reader(&self, path: &Path) -> Result<BoxAsyncRead> {
        let path = validate_path(path)?;
        let object =
            self.storage.read().await.get(&path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))?;
        Ok(Box::pin(Cursor::new(object.data)))
    }

    async fn upload(&self, path: &Path, source: &Path, meta: &UploadMeta) -> Result<()> {
        let path = validate_path(path)?;
        let data = tokio::fs::read(source).await.map_err(ErrorKind::Io)?;
        self.uploads.write().await.push(path.clone());
        if self.read_only {
            exn::bail!(ErrorKind::PermissionDenied(path));
        }
        self.storage.write().await.insert(path, Object { data, meta: Some(meta.clone()) });
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        self.deletes.write().await.push(path.clone());
        self.storage.write().await.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }
}
