//! Format validators and repairers.
//!
//! Only formats with a known validator are checked at all; PDF (via qpdf)
//! is the one that ships. Both capabilities are traits so the pipeline can be
//! driven with fakes.

use crate::error::{ErrorKind, Result};
use crate::tools::{ExitPolicy, Tool, Verdict};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

/// Checks whether a file of a given type is intact.
#[async_trait]
pub trait IntegrityChecker: Send + Sync {
    /// Whether this checker knows how to validate `mime` at all.
    fn applies_to(&self, mime: &str) -> bool;

    /// Errors mean the check could not be carried out (launch failure,
    /// timeout), not that the file is broken.
    async fn check(&self, path: &Path) -> Result<Verdict>;
}

/// Attempts to rewrite a corrupt file into a usable one.
#[async_trait]
pub trait Repairer: Send + Sync {
    /// Write a repaired candidate of `input` to `output`.
    ///
    /// The returned verdict is the repair tool's own opinion; callers should
    /// still check the candidate before trusting it.
    async fn repair(&self, input: &Path, output: &Path) -> Result<Verdict>;
}

/// [`IntegrityChecker`] backed by an external tool and an [`ExitPolicy`].
#[derive(Debug, Clone)]
pub struct ToolChecker {
    tool: Tool,
    policy: ExitPolicy,
    mime_types: Vec<String>,
}
impl ToolChecker {
    pub fn new(tool: Tool, policy: ExitPolicy, mime_types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            tool,
            policy,
            mime_types: mime_types.into_iter().map(Into::into).collect(),
        }
    }

    /// `qpdf --check`, for PDFs.
    pub fn qpdf(timeout: Duration, policy: ExitPolicy) -> Result<Self> {
        Ok(Self::new(Tool::locate("qpdf", ["--check"], timeout)?, policy, ["application/pdf"]))
    }
}

#[async_trait]
impl IntegrityChecker for ToolChecker {
    fn applies_to(&self, mime: &str) -> bool {
        self.mime_types.iter().any(|m| m.eq_ignore_ascii_case(mime))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn check(&self, path: &Path) -> Result<Verdict> {
        let output = self.tool.run(path, None).await?;
        Ok(self.policy.verdict(&output))
    }
}

/// [`Repairer`] backed by an external tool that reads one file and writes
/// another.
#[derive(Debug, Clone)]
pub struct ToolRepairer {
    tool: Tool,
    policy: ExitPolicy,
}
impl ToolRepairer {
    pub fn new(tool: Tool, policy: ExitPolicy) -> Self {
        Self { tool, policy }
    }

    /// `qpdf <input> <output>`: rewriting a PDF rebuilds its cross-reference
    /// table, which fixes most truncation damage.
    pub fn qpdf(timeout: Duration, policy: ExitPolicy) -> Result<Self> {
        Ok(Self::new(Tool::locate("qpdf", [crate::tools::INPUT, crate::tools::OUTPUT], timeout)?, policy))
    }
}

#[async_trait]
impl Repairer for ToolRepairer {
    #[instrument(skip(self), fields(input = %input.display()))]
    async fn repair(&self, input: &Path, output: &Path) -> Result<Verdict> {
        let result = self.tool.run(input, Some(output)).await?;
        let verdict = self.policy.verdict(&result);
        if verdict.is_valid() && !tokio::fs::try_exists(output).await.unwrap_or(false) {
            // A "successful" repair that wrote nothing is no repair at all.
            exn::bail!(ErrorKind::NoOutput(self.tool.program().display().to_string()));
        }
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(script: &str) -> ToolChecker {
        ToolChecker::new(Tool::new("sh", ["-c", script], Duration::from_secs(5)), ExitPolicy::default(), [
            "application/pdf",
        ])
    }

    #[test]
    fn test_applies_to() {
        let checker = checker("exit 0");
        assert!(checker.applies_to("application/pdf"));
        assert!(checker.applies_to("Application/PDF"));
        assert!(!checker.applies_to("text/plain"));
    }

    #[tokio::test]
    async fn test_check_verdicts() {
        let path = Path::new("/in.pdf");
        assert_eq!(checker("exit 0").check(path).await.unwrap(), Verdict::Valid);
        assert!(matches!(checker("echo warn >&2; exit 3").check(path).await.unwrap(), Verdict::ValidWithWarnings { diagnostics } if diagnostics == "warn"));
        assert!(!checker("exit 2").check(path).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_repair_writes_candidate() {
        let scratch = tempfile::tempdir().unwrap();
        let input = scratch.path().join("source");
        let output = scratch.path().join("repaired");
        std::fs::write(&input, b"%PDF-1.4 broken").unwrap();
        let repairer = ToolRepairer::new(
            Tool::new("sh", ["-c", "cp \"$1\" \"$2\"", "sh", "{input}", "{output}"], Duration::from_secs(5)),
            ExitPolicy::default(),
        );
        assert_eq!(repairer.repair(&input, &output).await.unwrap(), Verdict::Valid);
        assert_eq!(std::fs::read(&output).unwrap(), b"%PDF-1.4 broken");
    }

    #[tokio::test]
    async fn test_repair_without_output_is_an_error() {
        let scratch = tempfile::tempdir().unwrap();
        let repairer =
            ToolRepairer::new(Tool::new("sh", ["-c", "exit 0"], Duration::from_secs(5)), ExitPolicy::default());
        let err = repairer.repair(&scratch.path().join("source"), &scratch.path().join("repaired")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NoOutput(_)));
    }

    #[tokio::test]
    async fn test_failed_repair_is_corrupt() {
        let scratch = tempfile::tempdir().unwrap();
        let repairer =
            ToolRepairer::new(Tool::new("sh", ["-c", "exit 2"], Duration::from_secs(5)), ExitPolicy::default());
        let verdict = repairer.repair(&scratch.path().join("source"), &scratch.path().join("repaired")).await.unwrap();
        assert!(!verdict.is_valid());
    }
}
