use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One routing key or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Destinations {
    One(String),
    Many(Vec<String>),
}
impl Destinations {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(key) => vec![key.clone()],
            Self::Many(keys) => keys.clone(),
        }
    }
}

/// MIME type → downstream routing keys.
///
/// Deletion notices go to `deleted`, `file.deleted` unless configured. An
/// empty key turns them off.
///
/// ```toml
/// [routing]
/// deleted = "file.deleted"
///
/// [routing.destinations]
/// "application/pdf" = ["pdf.text", "pdf.thumbnail", "pdf.pages"]
/// "text/plain" = "text.index"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub destinations: BTreeMap<String, Destinations>,
    #[serde(default = "default_deleted", skip_serializing_if = "Option::is_none")]
    pub deleted: Option<String>,
}
impl Default for RoutingConfig {
    fn default() -> Self {
        Self { destinations: BTreeMap::new(), deleted: default_deleted() }
    }
}

fn default_deleted() -> Option<String> {
    Some("file.deleted".to_string())
}

impl RoutingConfig {
    /// Routing key for deletion notices, if they are wanted at all.
    pub fn deleted_routing_key(&self) -> Option<&str> {
        self.deleted.as_deref().map(str::trim).filter(|key| !key.is_empty())
    }

    /// Flattened table, MIME types lowercased. Entries for the same type in
    /// different case are merged.
    pub fn table(&self) -> BTreeMap<String, Vec<String>> {
        let mut table: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (mime, destinations) in &self.destinations {
            let entry = table.entry(mime.trim().to_ascii_lowercase()).or_default();
            for key in destinations.to_vec() {
                if !entry.contains(&key) {
                    entry.push(key);
                }
            }
        }
        table
    }

    pub(crate) fn problem(&self) -> Option<String> {
        for (mime, destinations) in &self.destinations {
            if mime.trim().is_empty() {
                return Some("routing.destinations: empty MIME type".to_string());
            }
            if destinations.to_vec().iter().any(|key| key.trim().is_empty()) {
                return Some(format!("routing.destinations.\"{mime}\": empty routing key"));
            }
        }
        None
    }
}
