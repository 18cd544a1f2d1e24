use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An external program and how to call it. `{input}` and `{output}` in
/// `args` are replaced with file paths; without `{input}` the paths are
/// appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub timeout_secs: u64,
}
impl ToolConfig {
    fn new(program: &str, args: &[&str], timeout_secs: u64) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Prints the MIME type of a file's content.
    pub sniffer: ToolConfig,
    /// Validates files of the `checked_types`.
    pub checker: ToolConfig,
    /// Writes a repaired copy of a file that failed validation.
    pub repairer: ToolConfig,
    /// Non-zero exit statuses meaning "valid, with warnings".
    pub tolerated_codes: Vec<i32>,
    /// MIME types the checker understands.
    pub checked_types: Vec<String>,
}
impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            sniffer: ToolConfig::new("file", &["--mime-type", "--brief"], 10),
            checker: ToolConfig::new("qpdf", &["--check"], 60),
            repairer: ToolConfig::new("qpdf", &["{input}", "{output}"], 120),
            tolerated_codes: vec![3],
            checked_types: vec!["application/pdf".to_string()],
        }
    }
}
impl ToolsConfig {
    pub(crate) fn problem(&self) -> Option<String> {
        [("sniffer", &self.sniffer), ("checker", &self.checker), ("repairer", &self.repairer)].into_iter().find_map(
            |(name, tool)| {
                if tool.program.trim().is_empty() {
                    Some(format!("tools.{name}.program"))
                } else if tool.timeout_secs == 0 {
                    Some(format!("tools.{name}.timeout_secs"))
                } else {
                    None
                }
            },
        )
    }
}
