//! Configuration loading and validation.
//!
//! Sources are merged in order, later ones winning:
//! 1. Built-in defaults ([`Config::default`]).
//! 2. A configuration file: TOML, YAML or JSON, picked by extension. Either
//!    given explicitly, or `config.toml` in the platform config directory
//!    (`~/.config/maw/` on Linux) if it exists.
//! 3. Environment variables prefixed with `MAW_`, with `__` separating
//!    nested keys (`MAW_TOOLS__CHECKER__TIMEOUT_SECS=30`).

pub mod error;
mod library;
mod routing;
mod tools;

pub use crate::library::LibraryConfig;
pub use crate::routing::{Destinations, RoutingConfig};
pub use crate::tools::{ToolConfig, ToolsConfig};
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "MAW_";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Library that storage-provider notifications belong to.
    pub default_library: String,
    /// Event names starting with this are storage-provider notifications.
    pub provider_prefix: String,
    /// Files whose name starts with one of these are skipped (editor lock
    /// files, dotfiles).
    pub ignored_prefixes: Vec<String>,
    /// Graph database file (`:memory:` for a throwaway graph).
    pub database: PathBuf,
    /// Parent directory for per-event scratch space. System temp if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    /// Messages processed at the same time.
    pub concurrency: usize,
    /// Read buffer size for fingerprinting, in bytes.
    pub chunk_size: usize,
    pub libraries: BTreeMap<String, LibraryConfig>,
    pub routing: RoutingConfig,
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_library: "miniofiles".to_string(),
            provider_prefix: "s3:".to_string(),
            ignored_prefixes: vec!["~".to_string(), ".".to_string()],
            database: project_dirs()
                .map(|dirs| dirs.data_dir().join("graph.sqlite"))
                .unwrap_or_else(|| PathBuf::from("maw-graph.sqlite")),
            temp_dir: None,
            concurrency: 8,
            chunk_size: 64 * 1024,
            libraries: BTreeMap::new(),
            routing: RoutingConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "maw")
}

impl Config {
    /// Configuration file looked for when none is given.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Merge every configuration source, without extracting or validating.
    ///
    /// An explicitly given `file` must exist; the default one is optional.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let figment = match file {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
                }
                merge_file(figment, path)
            }
            None => match Self::default_path() {
                Some(path) if path.is_file() => merge_file(figment, &path),
                _ => figment,
            },
        };
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load and validate configuration from every source.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(&Self::figment(file)?)
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_library.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("default_library: must not be empty".to_string()));
        }
        if !self.libraries.contains_key(&self.default_library) {
            exn::bail!(ErrorKind::Invalid(format!(
                "default_library: \"{}\" is not a configured library",
                self.default_library
            )));
        }
        if self.provider_prefix.is_empty() {
            exn::bail!(ErrorKind::Invalid("provider_prefix: must not be empty".to_string()));
        }
        if self.ignored_prefixes.iter().any(String::is_empty) {
            exn::bail!(ErrorKind::Invalid("ignored_prefixes: entries must not be empty".to_string()));
        }
        if self.concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("concurrency: must be at least 1".to_string()));
        }
        if self.chunk_size == 0 {
            exn::bail!(ErrorKind::Invalid("chunk_size: must be at least 1".to_string()));
        }
        for (name, library) in &self.libraries {
            if let Some(problem) = library.problem() {
                exn::bail!(ErrorKind::Invalid(format!("libraries.{name}: {problem}")));
            }
        }
        if let Some(problem) = self.routing.problem() {
            exn::bail!(ErrorKind::Invalid(problem));
        }
        if let Some(field) = self.tools.problem() {
            exn::bail!(ErrorKind::Invalid(field));
        }
        tracing::debug!(libraries = self.libraries.len(), routes = self.routing.destinations.len(), "Configuration valid");
        Ok(())
    }

    /// Copy with secrets masked, safe to print.
    pub fn redacted(&self) -> Self {
        Self {
            libraries: self.libraries.iter().map(|(name, lib)| (name.clone(), lib.redacted())).collect(),
            ..self.clone()
        }
    }
}

fn merge_file(figment: Figment, path: &Path) -> Figment {
    tracing::debug!(path = %path.display(), "Loading configuration file");
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
        Some("json") => figment.merge(Json::file_exact(path)),
        _ => figment.merge(Toml::file_exact(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const MINIMAL: &str = r#"
        [libraries.miniofiles]
        type = "local"
        path = "/srv/files"
    "#;

    fn from_toml(toml: &str) -> Result<Config> {
        Config::from_figment(&Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(toml)))
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = from_toml(MINIMAL).unwrap();
        assert_eq!(config.default_library, "miniofiles");
        assert_eq!(config.provider_prefix, "s3:");
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.tools.tolerated_codes, vec![3]);
        assert_eq!(config.tools.checker.program, "qpdf");
        assert!(config.routing.destinations.is_empty());
        assert_eq!(config.routing.deleted_routing_key(), Some("file.deleted"));
        assert_eq!(config.ignored_prefixes, vec!["~".to_string(), ".".to_string()]);
    }

    #[test]
    fn test_deletion_notices_can_be_turned_off() {
        let config = from_toml(&format!("{MINIMAL}\n[routing]\ndeleted = \"\"\n")).unwrap();
        assert_eq!(config.routing.deleted_routing_key(), None);
        let config = from_toml(&format!("{MINIMAL}\n[routing]\ndeleted = \"files.gone\"\n")).unwrap();
        assert_eq!(config.routing.deleted_routing_key(), Some("files.gone"));
    }

    #[test]
    fn test_ignored_prefixes_can_be_cleared() {
        let config = from_toml(&format!("ignored_prefixes = []\n{MINIMAL}")).unwrap();
        assert!(config.ignored_prefixes.is_empty());
    }

    #[test]
    fn test_default_library_must_exist() {
        let err = from_toml("").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(msg) if msg.starts_with("default_library")));
    }

    #[test]
    fn test_partial_tool_override_keeps_defaults() {
        let config = from_toml(&format!("{MINIMAL}\n[tools.checker]\ntimeout_secs = 5\n")).unwrap();
        assert_eq!(config.tools.checker.timeout_secs, 5);
        assert_eq!(config.tools.checker.args, vec!["--check".to_string()]);
    }

    #[test]
    fn test_routing_accepts_one_or_many() {
        let config = from_toml(&format!(
            r#"{MINIMAL}
            [routing]
            deleted = "file.deleted"
            [routing.destinations]
            "application/pdf" = ["pdf.text", "pdf.thumbnail", "pdf.pages"]
            "Text/Plain" = "text.index"
            "#
        ))
        .unwrap();
        let table = config.routing.table();
        assert_eq!(table["application/pdf"].len(), 3);
        assert_eq!(table["text/plain"], vec!["text.index".to_string()]);
        assert_eq!(config.routing.deleted.as_deref(), Some("file.deleted"));
    }

    #[rstest]
    #[case::zero_concurrency("concurrency = 0", "concurrency")]
    #[case::empty_prefix("provider_prefix = \"\"", "provider_prefix")]
    #[case::empty_ignored_prefix("ignored_prefixes = [\"~\", \"\"]", "ignored_prefixes")]
    #[case::zero_timeout("[tools.repairer]\ntimeout_secs = 0", "tools.repairer.timeout_secs")]
    #[case::empty_key("[routing.destinations]\n\"text/plain\" = \"\"", "routing.destinations")]
    #[case::relative_library("[libraries.other]\ntype = \"local\"\npath = \"relative\"", "libraries.other")]
    fn test_invalid_values(#[case] extra: &str, #[case] field: &str) {
        // Top-level keys must come before any table header.
        let err = from_toml(&format!("{extra}\n{MINIMAL}")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(msg) if msg.starts_with(field)), "{err:?}");
    }

    #[test]
    fn test_s3_library_and_redaction() {
        let config = from_toml(
            r#"
            [libraries.miniofiles]
            type = "s3"
            bucket = "filestore"
            region = "us-east-1"
            endpoint = "http://minio:9000"
            key_id = "minio"
            key_secret = "hunter2"
            "#,
        )
        .unwrap();
        let LibraryConfig::S3 { key_secret, prefix, .. } = &config.redacted().libraries["miniofiles"] else {
            panic!("expected an S3 library");
        };
        assert_eq!(key_secret, "********");
        assert!(prefix.is_none());
        assert!(matches!(&config.libraries["miniofiles"], LibraryConfig::S3 { key_secret, .. } if key_secret == "hunter2"));
    }

    #[rstest]
    #[case("config.toml", MINIMAL)]
    #[case("config.yaml", "libraries:\n  miniofiles:\n    type: local\n    path: /srv/files\n")]
    #[case("config.json", r#"{"libraries": {"miniofiles": {"type": "local", "path": "/srv/files"}}}"#)]
    fn test_load_file_by_extension(#[case] name: &str, #[case] contents: &str) {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join(name);
        std::fs::write(&path, contents).unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.libraries["miniofiles"], LibraryConfig::Local { path: PathBuf::from("/srv/files") });
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let scratch = tempfile::tempdir().unwrap();
        let err = Config::figment(Some(&scratch.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
