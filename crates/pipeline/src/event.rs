use maw_graph::Identity;
use std::fmt;
use time::OffsetDateTime;

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Delete,
}
impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
        })
    }
}

/// A normalized notification that a file was created/updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionEvent {
    /// Storage namespace the file lives in.
    pub library: String,
    /// Object key within the library.
    pub path: String,
    pub action: Action,
    /// When the source event occurred.
    pub timestamp: OffsetDateTime,
}
impl IngestionEvent {
    pub fn identity(&self) -> Identity {
        Identity::new(&self.library, &self.path)
    }

    /// Display name of the file: the last segment of its path.
    pub fn name(&self) -> &str {
        self.path.trim_end_matches('/').rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or(&self.path)
    }

    /// Directory placeholders ("folders" in object stores) end in a slash.
    pub fn is_folder(&self) -> bool {
        self.path.ends_with('/')
    }

    /// Editor lock files and dotfiles: the file name starts with one of
    /// `prefixes`.
    pub fn is_hidden(&self, prefixes: &[String]) -> bool {
        let name = self.name();
        prefixes.iter().any(|prefix| !prefix.is_empty() && name.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn event(path: &str) -> IngestionEvent {
        IngestionEvent {
            library: "docs".to_string(),
            path: path.to_string(),
            action: Action::Create,
            timestamp: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[rstest]
    #[case("/a.txt", "a.txt")]
    #[case("reports/2024/q1.pdf", "q1.pdf")]
    #[case("plain", "plain")]
    #[case("reports/", "reports")]
    fn test_name(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(event(path).name(), expected);
    }

    #[test]
    fn test_folder() {
        assert!(event("reports/").is_folder());
        assert!(!event("reports/q1.pdf").is_folder());
    }

    #[rstest]
    #[case("~$report.docx", true)]
    #[case(".DS_Store", true)]
    #[case("reports/.hidden", true)]
    #[case("reports/~lock.q1.odt#", true)]
    #[case("a.txt", false)]
    #[case("reports/q1.pdf", false)]
    #[case(".reports/q1.pdf", false)]
    fn test_hidden(#[case] path: &str, #[case] expected: bool) {
        let prefixes = ["~".to_string(), ".".to_string()];
        assert_eq!(event(path).is_hidden(&prefixes), expected);
        assert!(!event(path).is_hidden(&[]));
    }
}
