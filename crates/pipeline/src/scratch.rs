use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Per-event scratch directory, removed when dropped.
///
/// Exclusively owned by one event's task. Holds the downloaded source and,
/// if a repair was attempted, the repaired candidate.
pub(crate) struct Scratch {
    dir: TempDir,
}
impl Scratch {
    pub(crate) fn new(parent: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("maw-");
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    pub(crate) fn source(&self) -> PathBuf {
        self.dir.path().join("source")
    }

    pub(crate) fn repaired(&self) -> PathBuf {
        self.dir.path().join("repaired")
    }

    /// Remove the directory now, reporting (rather than swallowing) failure.
    pub(crate) fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(error = %e, path = %path.display(), "Could not remove scratch directory");
        }
    }
}
