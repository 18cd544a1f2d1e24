//! Builds the pipeline's capabilities from configuration.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use maw_config::{Config, LibraryConfig, ToolConfig};
use maw_graph::{Database, Repository};
use maw_inspect::{ExitPolicy, FileSniffer, Fingerprinter, Tool, ToolChecker, ToolRepairer};
use maw_pipeline::{Context, MessageRules, Publisher, Routes};
#[cfg(feature = "s3")]
use maw_storage::backend::S3Backend;
use maw_storage::backend::LocalBackend;
use maw_storage::{BackendHandle, Librarian};
use std::sync::Arc;

/// One backend per configured library.
pub async fn librarian(config: &Config) -> Result<Librarian> {
    let mut librarian = Librarian::new();
    for (name, library) in &config.libraries {
        let backend: BackendHandle = match library {
            LibraryConfig::Local { path } => {
                Arc::new(LocalBackend::new(name, path).or_raise(|| ErrorKind::Library(name.clone()))?)
            }
            #[cfg(feature = "s3")]
            LibraryConfig::S3 { bucket, prefix, region, endpoint, key_id, key_secret } => Arc::new(
                S3Backend::new(name, bucket, prefix.clone(), region, endpoint.clone(), key_id, key_secret)
                    .await
                    .or_raise(|| ErrorKind::Library(name.clone()))?,
            ),
            #[cfg(not(feature = "s3"))]
            LibraryConfig::S3 { .. } => exn::bail!(ErrorKind::S3Unsupported(name.clone())),
        };
        tracing::debug!(library = %name, "Opened library");
        librarian.insert(name, backend);
    }
    Ok(librarian)
}

/// Open (creating if needed) the graph database.
pub async fn database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Database)?;
    }
    let db = Database::connect(&config.database).await.or_raise(|| ErrorKind::Database)?;
    tracing::debug!(path = %config.database.display(), "Opened graph database");
    Ok(db)
}

fn locate(tool: &ToolConfig, role: &'static str) -> Result<Tool> {
    Tool::locate(&tool.program, tool.args.iter().cloned(), tool.timeout()).or_raise(|| ErrorKind::Tool(role))
}

/// The external programs, resolved on `PATH` up front so a missing one
/// stops startup rather than every event.
pub struct Tools {
    pub sniffer: FileSniffer,
    pub checker: ToolChecker,
    pub repairer: ToolRepairer,
}
impl Tools {
    pub fn locate(config: &Config) -> Result<Self> {
        let tools = &config.tools;
        let policy = ExitPolicy::new(tools.tolerated_codes.iter().copied());
        Ok(Self {
            sniffer: FileSniffer::new(locate(&tools.sniffer, "sniffer")?),
            checker: ToolChecker::new(locate(&tools.checker, "checker")?, policy.clone(), tools.checked_types.iter().cloned()),
            repairer: ToolRepairer::new(locate(&tools.repairer, "repairer")?, policy),
        })
    }
}

pub fn routes(config: &Config) -> Routes {
    Routes::new(config.routing.table())
}

pub fn rules(config: &Config) -> MessageRules {
    MessageRules {
        default_library: config.default_library.clone(),
        provider_prefix: config.provider_prefix.clone(),
        ignored_prefixes: config.ignored_prefixes.clone(),
    }
}

/// Everything the dispatcher needs, publishing through `publisher`.
pub async fn context(config: &Config, db: &Database, publisher: Arc<dyn Publisher>) -> Result<Context> {
    let tools = Tools::locate(config)?;
    let routes = routes(config);
    tracing::info!(libraries = config.libraries.len(), routed_types = routes.len(), "Pipeline ready");
    Ok(Context {
        librarian: librarian(config).await?,
        repository: Repository::from(db),
        sniffer: Arc::new(tools.sniffer),
        checker: Arc::new(tools.checker),
        repairer: Arc::new(tools.repairer),
        publisher,
        fingerprinter: Fingerprinter::with_chunk_size(config.chunk_size),
        routes,
        rules: rules(config),
        deleted_routing_key: config.routing.deleted_routing_key().map(str::to_string),
        temp_dir: config.temp_dir.clone(),
    })
}
