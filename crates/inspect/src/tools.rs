//! Bounded external tool invocation.
//!
//! Every external program runs through [`Tool::run`]: it is spawned with
//! `kill_on_drop`, raced against its time limit, and killed if it loses. The
//! question of which exit statuses mean "fine" lives in [`ExitPolicy`] and
//! nowhere else.

use crate::error::{ErrorKind, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::instrument;

/// Placeholder replaced by the file being inspected.
pub const INPUT: &str = "{input}";
/// Placeholder replaced by the file a tool should write to.
pub const OUTPUT: &str = "{output}";

/// An external program with its argument template and time limit.
///
/// Arguments may contain [`INPUT`] and [`OUTPUT`] placeholders. A path whose
/// placeholder no argument mentions is appended, the input before the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

/// What a finished tool left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` if the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}
impl ToolOutput {
    /// Whatever the tool had to say, stderr first (that's where checkers
    /// put their complaints).
    pub fn diagnostics(&self) -> String {
        [self.stderr.trim(), self.stdout.trim()].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join("\n")
    }
}

impl Tool {
    pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<String>>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
        }
    }

    /// Resolve `program` on `PATH` (absolute paths are checked as-is).
    pub fn locate(
        program: impl AsRef<str>,
        args: impl IntoIterator<Item = impl Into<String>>,
        timeout: Duration,
    ) -> Result<Self> {
        let program = program.as_ref();
        let Ok(path) = which::which(program) else {
            exn::bail!(ErrorKind::ToolNotFound(program.to_string()));
        };
        tracing::trace!(program, path = %path.display(), "Located external tool");
        Ok(Self::new(path, args, timeout))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn name(&self) -> String {
        self.program.file_name().unwrap_or(self.program.as_os_str()).to_string_lossy().into_owned()
    }

    /// Expand the argument template for one invocation. Paths whose
    /// placeholder appears nowhere are appended, input first.
    fn arguments(&self, input: &Path, output: Option<&Path>) -> Vec<OsString> {
        let mut args = Vec::with_capacity(self.args.len() + 2);
        let mut has_input = false;
        let mut has_output = false;
        for arg in &self.args {
            if arg == INPUT {
                has_input = true;
                args.push(input.as_os_str().to_owned());
            } else if arg == OUTPUT {
                has_output = true;
                match output {
                    Some(output) => args.push(output.as_os_str().to_owned()),
                    None => tracing::warn!(tool = %self.name(), "Output placeholder given to a tool without output"),
                }
            } else {
                has_input |= arg.contains(INPUT);
                has_output |= arg.contains(OUTPUT);
                args.push(substitute(arg, input, output).into());
            }
        }
        if !has_input {
            args.push(input.as_os_str().to_owned());
        }
        if let Some(output) = output.filter(|_| !has_output) {
            args.push(output.as_os_str().to_owned());
        }
        args
    }

    /// Run the tool against `input` (and `output`, for tools that write a
    /// file), waiting at most the configured time limit.
    ///
    /// Failing to start the program and running out of time are errors; any
    /// exit status is a valid [`ToolOutput`] for an [`ExitPolicy`] to judge.
    #[instrument(skip(self), fields(tool = %self.name()))]
    pub async fn run(&self, input: &Path, output: Option<&Path>) -> Result<ToolOutput> {
        let child = Command::new(&self.program)
            .args(self.arguments(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::warn!(error = %e, program = %self.program.display(), "Could not spawn tool");
                ErrorKind::Launch(self.name())
            })?;
        // Dropping the wait future on timeout drops the child, which kills it.
        let finished = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(finished) => finished,
            Err(_) => exn::bail!(ErrorKind::Timeout { program: self.name(), limit: self.timeout }),
        };
        let finished = finished.map_err(|e| {
            tracing::warn!(error = %e, "Lost track of tool process");
            ErrorKind::Wait(self.name())
        })?;
        let output = ToolOutput {
            status: finished.status.code(),
            stdout: String::from_utf8_lossy(&finished.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&finished.stderr).into_owned(),
        };
        tracing::debug!(status = ?output.status, "Tool finished");
        Ok(output)
    }
}

fn substitute(arg: &str, input: &Path, output: Option<&Path>) -> String {
    let arg = arg.replace(INPUT, &input.to_string_lossy());
    match output {
        Some(output) => arg.replace(OUTPUT, &output.to_string_lossy()),
        None => arg,
    }
}

/// Outcome of validating (or repairing) a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    /// A tolerated non-zero status: the file is usable, the tool grumbled.
    ValidWithWarnings { diagnostics: String },
    Corrupt { diagnostics: String },
}
impl Verdict {
    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Corrupt { .. })
    }
}

/// Which exit statuses count as success.
///
/// Zero is always valid. Statuses in `tolerated` are valid with warnings
/// (qpdf exits with 3 when it had to work around problems but the file is
/// fine). Everything else, including death by signal, is corrupt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitPolicy {
    tolerated: Vec<i32>,
}
impl Default for ExitPolicy {
    fn default() -> Self {
        Self { tolerated: vec![3] }
    }
}
impl ExitPolicy {
    pub fn new(tolerated: impl IntoIterator<Item = i32>) -> Self {
        Self { tolerated: tolerated.into_iter().collect() }
    }

    pub fn verdict(&self, output: &ToolOutput) -> Verdict {
        match output.status {
            Some(0) => Verdict::Valid,
            Some(code) if self.tolerated.contains(&code) => {
                Verdict::ValidWithWarnings { diagnostics: output.diagnostics() }
            }
            _ => Verdict::Corrupt { diagnostics: output.diagnostics() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sh(script: &str) -> Tool {
        Tool::new("sh", ["-c", script], Duration::from_secs(5))
    }

    fn output(status: Option<i32>) -> ToolOutput {
        ToolOutput { status, stdout: String::new(), stderr: "xref table damaged\n".to_string() }
    }

    #[rstest]
    #[case::clean(Some(0), Verdict::Valid)]
    #[case::warnings(Some(3), Verdict::ValidWithWarnings { diagnostics: "xref table damaged".to_string() })]
    #[case::errors(Some(2), Verdict::Corrupt { diagnostics: "xref table damaged".to_string() })]
    #[case::signalled(None, Verdict::Corrupt { diagnostics: "xref table damaged".to_string() })]
    fn test_default_policy(#[case] status: Option<i32>, #[case] expected: Verdict) {
        assert_eq!(ExitPolicy::default().verdict(&output(status)), expected);
    }

    #[test]
    fn test_custom_policy() {
        let policy = ExitPolicy::new([]);
        assert!(!policy.verdict(&output(Some(3))).is_valid());
        let policy = ExitPolicy::new([1, 2]);
        assert!(policy.verdict(&output(Some(2))).is_valid());
    }

    #[rstest]
    #[case::appended(&["--check"], &["--check", "/in.pdf"])]
    #[case::placeholder(&["--check", "{input}", "--quiet"], &["--check", "/in.pdf", "--quiet"])]
    #[case::embedded(&["--file={input}"], &["--file=/in.pdf"])]
    fn test_arguments_without_output(#[case] args: &[&str], #[case] expected: &[&str]) {
        let tool = Tool::new("qpdf", args.iter().copied(), Duration::from_secs(1));
        let expanded = tool.arguments(Path::new("/in.pdf"), None);
        assert_eq!(expanded, expected.iter().map(OsString::from).collect::<Vec<_>>());
    }

    #[test]
    fn test_arguments_with_output() {
        let tool = Tool::new("qpdf", Vec::<String>::new(), Duration::from_secs(1));
        let expanded = tool.arguments(Path::new("/in.pdf"), Some(Path::new("/out.pdf")));
        assert_eq!(expanded, vec![OsString::from("/in.pdf"), OsString::from("/out.pdf")]);
        let tool = Tool::new("qpdf", ["{input}", "--linearize", "{output}"], Duration::from_secs(1));
        let expanded = tool.arguments(Path::new("/in.pdf"), Some(Path::new("/out.pdf")));
        assert_eq!(expanded, ["/in.pdf", "--linearize", "/out.pdf"].map(OsString::from).to_vec());
    }

    #[rstest]
    #[case::output_only(&["--out", "{output}"], &["--out", "/out.pdf", "/in.pdf"])]
    #[case::embedded_output(&["--out={output}"], &["--out=/out.pdf", "/in.pdf"])]
    #[case::input_only(&["{input}", "--fix"], &["/in.pdf", "--fix", "/out.pdf"])]
    fn test_arguments_append_only_missing_paths(#[case] args: &[&str], #[case] expected: &[&str]) {
        let tool = Tool::new("qpdf", args.iter().copied(), Duration::from_secs(1));
        let expanded = tool.arguments(Path::new("/in.pdf"), Some(Path::new("/out.pdf")));
        assert_eq!(expanded, expected.iter().map(OsString::from).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_run_captures_status_and_streams() {
        // With `sh -c`, the appended input path becomes $0.
        let out = sh("echo \"checked $0\"; echo broken >&2; exit 2").run(Path::new("/in.pdf"), None).await.unwrap();
        assert_eq!(out.status, Some(2));
        assert_eq!(out.stdout.trim(), "checked /in.pdf");
        assert_eq!(out.diagnostics(), "broken\nchecked /in.pdf");
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let tool = Tool::new("sh", ["-c", "sleep 10"], Duration::from_millis(100));
        let err = tool.run(Path::new("/in.pdf"), None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Timeout { program, .. } if program == "sh"));
    }

    #[tokio::test]
    async fn test_run_launch_failure() {
        let tool = Tool::new("/definitely/not/a/program", Vec::<String>::new(), Duration::from_secs(1));
        let err = tool.run(Path::new("/in.pdf"), None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Launch(_)));
    }

    #[test]
    fn test_locate() {
        assert!(Tool::locate("sh", Vec::<String>::new(), Duration::from_secs(1)).unwrap().program().is_absolute());
        let err = Tool::locate("maw-no-such-tool", Vec::<String>::new(), Duration::from_secs(1)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::ToolNotFound(name) if name == "maw-no-such-tool"));
    }
}
