use std::collections::HashMap;

/// Static MIME type → routing key table.
///
/// Built once at startup and never mutated; a configuration change means a
/// new `Routes` (and, in practice, a restart).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routes {
    table: HashMap<String, Vec<String>>,
}

fn normalize(mime: &str) -> String {
    // Parameters (`; charset=utf-8`) never take part in routing.
    mime.split(';').next().unwrap_or(mime).trim().to_ascii_lowercase()
}

impl Routes {
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: IntoIterator<Item = String>,
    {
        let mut table: HashMap<String, Vec<String>> = HashMap::new();
        for (mime, keys) in entries {
            let entry = table.entry(normalize(mime.as_ref())).or_default();
            for key in keys {
                if !entry.contains(&key) {
                    entry.push(key);
                }
            }
        }
        table.retain(|_, keys| !keys.is_empty());
        Self { table }
    }

    /// Routing keys configured for `mime`; empty when the type goes nowhere.
    pub fn resolve(&self, mime: &str) -> &[String] {
        self.table.get(&normalize(mime)).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of MIME types with at least one destination.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn routes() -> Routes {
        Routes::new([
            ("application/pdf", vec!["pdf.text".to_string(), "pdf.thumbnail".to_string(), "pdf.pages".to_string()]),
            ("Text/Plain", vec!["text.index".to_string()]),
            ("image/png", vec![]),
        ])
    }

    #[rstest]
    #[case::many("application/pdf", 3)]
    #[case::one("text/plain", 1)]
    #[case::case_insensitive("APPLICATION/PDF", 3)]
    #[case::parameters("text/plain; charset=utf-8", 1)]
    #[case::configured_empty("image/png", 0)]
    #[case::unconfigured("video/mp4", 0)]
    fn test_resolve(#[case] mime: &str, #[case] expected: usize) {
        assert_eq!(routes().resolve(mime).len(), expected);
    }

    #[test]
    fn test_duplicates_merged() {
        let routes = Routes::new([
            ("text/plain", vec!["text.index".to_string()]),
            ("TEXT/PLAIN", vec!["text.index".to_string(), "text.lang".to_string()]),
        ]);
        assert_eq!(routes.resolve("text/plain"), ["text.index".to_string(), "text.lang".to_string()]);
        assert_eq!(routes.len(), 1);
    }
}
