//! MIME type resolution.
//!
//! Two opinions are gathered: one from the file's bytes (an external
//! sniffer, `file(1)` by default) and one from its name. Content wins, the
//! name is the fallback, and [`UNKNOWN_MIME`] is what's left when neither has
//! anything to say. Classification never fails.

use crate::error::{ErrorKind, Result};
use crate::tools::Tool;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// The generic "some bytes" type.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// Infers a MIME type from file content.
#[async_trait]
pub trait MimeSniffer: Send + Sync {
    /// `Ok(None)` means the content gave nothing away.
    async fn sniff(&self, path: &Path) -> Result<Option<String>>;
}

/// Sniffs content with an external tool that prints a MIME type, such as
/// `file --mime-type --brief`.
#[derive(Debug, Clone)]
pub struct FileSniffer {
    tool: Tool,
}
impl FileSniffer {
    pub fn new(tool: Tool) -> Self {
        Self { tool }
    }

    /// `file --mime-type --brief`, located on `PATH`.
    pub fn locate(timeout: Duration) -> Result<Self> {
        Ok(Self::new(Tool::locate("file", ["--mime-type", "--brief"], timeout)?))
    }
}

#[async_trait]
impl MimeSniffer for FileSniffer {
    async fn sniff(&self, path: &Path) -> Result<Option<String>> {
        let output = self.tool.run(path, None).await?;
        if output.status != Some(0) {
            tracing::debug!(status = ?output.status, stderr = %output.stderr.trim(), "Sniffer failed");
            exn::bail!(ErrorKind::NoOutput(self.tool.program().display().to_string()));
        }
        Ok(parse_sniffer_output(&output.stdout))
    }
}

/// Pull a MIME type out of sniffer output.
///
/// Tolerates both `--brief` output and the `path: type/subtype` form by
/// taking the last whitespace-separated token. Octet-stream counts as no
/// answer: that's the sniffer giving up, not an opinion.
fn parse_sniffer_output(stdout: &str) -> Option<String> {
    let token = stdout.split_whitespace().last()?.trim_end_matches(';').to_ascii_lowercase();
    if !token.contains('/') || token == UNKNOWN_MIME {
        return None;
    }
    Some(token)
}

/// MIME type implied by a file name's extension.
pub fn guess_from_name(name: &str) -> Option<String> {
    mime_guess::from_path(name).first_raw().map(str::to_string)
}

/// How a file's MIME type was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// The resolved type.
    pub mime: String,
    pub from_content: Option<String>,
    pub from_name: Option<String>,
}
impl Classification {
    fn resolve(from_content: Option<String>, from_name: Option<String>) -> Self {
        let mime = from_content.clone().or_else(|| from_name.clone()).unwrap_or_else(|| UNKNOWN_MIME.to_string());
        Self { mime, from_content, from_name }
    }

    /// Classify the file at `path`, known to the outside world as `name`.
    ///
    /// A sniffer that errors or times out is logged and treated as having no
    /// opinion.
    pub async fn of(sniffer: &dyn MimeSniffer, name: &str, path: &Path) -> Self {
        let from_content = match sniffer.sniff(path).await {
            Ok(mime) => mime,
            Err(e) => {
                tracing::warn!(error = ?e, name, "Content sniffing failed; falling back to file name");
                None
            }
        };
        let classification = Self::resolve(from_content, guess_from_name(name));
        tracing::debug!(
            mime = %classification.mime,
            from_content = ?classification.from_content,
            from_name = ?classification.from_name,
            "Classified file"
        );
        classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    struct Fixed(Option<&'static str>);
    #[async_trait]
    impl MimeSniffer for Fixed {
        async fn sniff(&self, _path: &Path) -> Result<Option<String>> {
            Ok(self.0.map(str::to_string))
        }
    }

    struct Broken;
    #[async_trait]
    impl MimeSniffer for Broken {
        async fn sniff(&self, _path: &Path) -> Result<Option<String>> {
            exn::bail!(ErrorKind::Launch("file".to_string()))
        }
    }

    #[rstest]
    #[case::brief("text/plain\n", Some("text/plain"))]
    #[case::with_path("/tmp/maw-x/source: application/pdf\n", Some("application/pdf"))]
    #[case::uppercase("Image/PNG", Some("image/png"))]
    #[case::octet("application/octet-stream\n", None)]
    #[case::empty("", None)]
    #[case::garbage("cannot open file", None)]
    fn test_parse_sniffer_output(#[case] stdout: &str, #[case] expected: Option<&str>) {
        assert_eq!(parse_sniffer_output(stdout).as_deref(), expected);
    }

    #[rstest]
    #[case::content_wins(Some("text/plain"), "notes.pdf", "text/plain")]
    #[case::name_fallback(None, "report.pdf", "application/pdf")]
    #[case::nothing(None, "mystery", UNKNOWN_MIME)]
    #[tokio::test]
    async fn test_resolution_order(#[case] sniffed: Option<&'static str>, #[case] name: &str, #[case] expected: &str) {
        let classification = Classification::of(&Fixed(sniffed), name, Path::new("/dev/null")).await;
        assert_eq!(classification.mime, expected);
    }

    #[tokio::test]
    async fn test_sniffer_failure_degrades() {
        let classification = Classification::of(&Broken, "a.txt", Path::new("/dev/null")).await;
        assert_eq!(classification.mime, "text/plain");
        assert!(classification.from_content.is_none());
    }

    #[tokio::test]
    async fn test_file_sniffer_with_script() {
        let sniffer = FileSniffer::new(Tool::new("sh", ["-c", "echo \"$0: text/csv\""], Duration::from_secs(5)));
        assert_eq!(sniffer.sniff(Path::new("/tmp/data")).await.unwrap().as_deref(), Some("text/csv"));
        let failing = FileSniffer::new(Tool::new("sh", ["-c", "exit 1"], Duration::from_secs(5)));
        assert!(failing.sniff(Path::new("/tmp/data")).await.is_err());
    }
}
