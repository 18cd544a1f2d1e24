//! `maw`: turns file storage events into a knowledge graph of files.

mod error;
mod logging;
mod setup;
mod transport;

use crate::error::{ErrorKind, Result};
use crate::logging::LogFormat;
use crate::transport::LinePublisher;
use clap::{ArgAction, Parser, Subcommand};
use exn::ResultExt;
use maw_config::Config;
use maw_inspect::{Classification, Fingerprinter, IntegrityChecker, Verdict};
use maw_pipeline::Dispatcher;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, BufReader};

#[derive(Debug, Parser)]
#[command(name = "maw", version, about = "Turns file storage events into a knowledge graph")]
struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// More logging; repeat for even more. `RUST_LOG` overrides this.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[arg(long, global = true, value_enum, default_value_t)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Process storage events, one JSON message per line, publishing results
    /// to stdout.
    Consume {
        /// Read messages from this file instead of stdin.
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Classify, fingerprint and check a local file, touching neither
    /// storage nor the graph.
    Inspect {
        file: PathBuf,
        /// Name to classify the file by, if not its own.
        #[arg(long)]
        name: Option<String>,
    },
    /// Print the merged configuration, secrets masked.
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "Exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    match cli.command {
        Command::Consume { input } => consume(&config, input.as_deref()).await,
        Command::Inspect { file, name } => inspect(&config, &file, name).await,
        Command::CheckConfig => {
            let rendered = serde_json::to_string_pretty(&config.redacted()).or_raise(|| ErrorKind::Output)?;
            println!("{rendered}");
            Ok(())
        }
    }
}

async fn consume(config: &Config, input: Option<&Path>) -> Result<()> {
    let db = setup::database(config).await?;
    let publisher = Arc::new(LinePublisher::new(tokio::io::stdout()));
    let dispatcher = Dispatcher::new(setup::context(config, &db, publisher).await?);
    let handled = match input {
        Some(path) => {
            let file = tokio::fs::File::open(path).await.or_raise(|| ErrorKind::Input)?;
            until_interrupted(&dispatcher, BufReader::new(file), config.concurrency).await
        }
        None => until_interrupted(&dispatcher, BufReader::new(tokio::io::stdin()), config.concurrency).await,
    };
    db.close().await;
    if let Some(handled) = handled? {
        tracing::info!(handled, "Input exhausted");
    }
    Ok(())
}

/// `None` if interrupted before the input ran out. In-flight messages are
/// abandoned; their scratch directories are removed as they drop.
async fn until_interrupted<R>(dispatcher: &Dispatcher, input: R, concurrency: usize) -> Result<Option<usize>>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        handled = transport::consume(dispatcher, input, concurrency) => handled.map(Some),
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted");
            Ok(None)
        }
    }
}

async fn inspect(config: &Config, file: &Path, name: Option<String>) -> Result<()> {
    let tools = setup::Tools::locate(config)?;
    let name = name
        .or_else(|| file.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default();
    let classification = Classification::of(&tools.sniffer, &name, file).await;
    let fingerprint =
        Fingerprinter::with_chunk_size(config.chunk_size).digest_file(file).await.or_raise(|| ErrorKind::Inspect)?;
    let integrity = if tools.checker.applies_to(&classification.mime) {
        let verdict = tools.checker.check(file).await.or_raise(|| ErrorKind::Inspect)?;
        Some(report_verdict(&verdict))
    } else {
        None
    };
    let report = json!({
        "name": name,
        "mime": classification.mime,
        "from_content": classification.from_content,
        "from_name": classification.from_name,
        "sha256": fingerprint.sha256,
        "size": fingerprint.size,
        "integrity": integrity,
    });
    let rendered = serde_json::to_string_pretty(&report).or_raise(|| ErrorKind::Output)?;
    println!("{rendered}");
    Ok(())
}

fn report_verdict(verdict: &Verdict) -> serde_json::Value {
    match verdict {
        Verdict::Valid => json!({ "status": "valid" }),
        Verdict::ValidWithWarnings { diagnostics } => json!({ "status": "valid_with_warnings", "diagnostics": diagnostics }),
        Verdict::Corrupt { diagnostics } => json!({ "status": "corrupt", "diagnostics": diagnostics }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["maw", "consume", "-vv", "--log-format", "json", "--input", "events.ndjson"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Command::Consume { input: Some(ref path) } if path == Path::new("events.ndjson")));
    }

    #[test]
    fn test_verdict_report() {
        let report = report_verdict(&Verdict::Corrupt { diagnostics: "xref damaged".to_string() });
        assert_eq!(report, json!({ "status": "corrupt", "diagnostics": "xref damaged" }));
        assert_eq!(report_verdict(&Verdict::Valid)["status"], "valid");
    }
}
