//! Streaming content digests.
//!
//! Content is pulled through a fixed-size buffer, so memory use does not
//! depend on the size of the file. The digest is SHA-256, encoded as
//! standard base64 (which is what the graph has always stored).

use crate::error::{ErrorKind, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::instrument;

/// Read buffer size used unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Digest and length of a piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Base64 SHA-256 of the content.
    pub sha256: String,
    /// Number of bytes consumed.
    pub size: u64,
}

/// Computes [`Fingerprint`]s over async byte streams.
#[derive(Debug, Clone, Copy)]
pub struct Fingerprinter {
    chunk_size: usize,
}
impl Default for Fingerprinter {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE }
    }
}
impl Fingerprinter {
    /// A fingerprinter reading `chunk_size` bytes at a time (at least one).
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self { chunk_size: chunk_size.max(1) }
    }

    /// Consume `reader` to the end and digest everything it produced.
    pub async fn digest<R: AsyncRead + Unpin>(&self, mut reader: R) -> Result<Fingerprint> {
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.chunk_size];
        let mut size = 0u64;
        loop {
            let read = reader.read(&mut buffer).await.map_err(ErrorKind::Read)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            size += read as u64;
        }
        Ok(Fingerprint { sha256: STANDARD.encode(hasher.finalize()), size })
    }

    /// Digest a local file.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn digest_file(&self, path: &Path) -> Result<Fingerprint> {
        let file = tokio::fs::File::open(path).await.map_err(ErrorKind::Read)?;
        self.digest(file).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    /// `printf 'hello' | sha256sum | xxd -r -p | base64`
    const HELLO: &str = "LPJNul+wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ=";
    /// SHA-256 of no bytes at all.
    const EMPTY: &str = "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=";

    #[tokio::test]
    async fn test_known_digest() {
        let fingerprint = Fingerprinter::default().digest(Cursor::new(b"hello")).await.unwrap();
        assert_eq!(fingerprint, Fingerprint { sha256: HELLO.to_string(), size: 5 });
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let fingerprint = Fingerprinter::default().digest(Cursor::new(Vec::new())).await.unwrap();
        assert_eq!(fingerprint.sha256, EMPTY);
        assert_eq!(fingerprint.size, 0);
    }

    #[rstest]
    #[case(1)]
    #[case(7)]
    #[case(4096)]
    #[case(DEFAULT_CHUNK_SIZE)]
    #[tokio::test]
    async fn test_chunk_size_does_not_change_digest(#[case] chunk_size: usize) {
        let content: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let baseline = Fingerprinter::default().digest(Cursor::new(content.clone())).await.unwrap();
        let chunked = Fingerprinter::with_chunk_size(chunk_size).digest(Cursor::new(content)).await.unwrap();
        assert_eq!(baseline, chunked);
        assert_eq!(chunked.size, 100_000);
    }

    #[tokio::test]
    async fn test_digest_file() {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();
        let fingerprint = Fingerprinter::default().digest_file(&path).await.unwrap();
        assert_eq!(fingerprint.sha256, HELLO);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let scratch = tempfile::tempdir().unwrap();
        let err = Fingerprinter::default().digest_file(&scratch.path().join("nope")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Read(_)));
    }
}
