//! Newline-delimited JSON transport.
//!
//! Inbound messages are read one per line from stdin (or a file); published
//! messages are written one per line, wrapped with their routing key, to
//! stdout. Piping these into and out of a real broker is left to the
//! surrounding deployment.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use futures::TryStreamExt;
use futures::stream;
use maw_pipeline::error::{ErrorKind as PipelineErrorKind, Result as PipelineResult};
use maw_pipeline::{Dispatcher, Outbound, Publisher};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Feed every non-blank line of `input` to the dispatcher, at most
/// `concurrency` at a time. Returns the number of messages handled.
///
/// Per-message failures are the dispatcher's business; only failing to read
/// the input stops consumption.
pub async fn consume<R>(dispatcher: &Dispatcher, input: R, concurrency: usize) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let handled = AtomicUsize::new(0);
    let lines = stream::try_unfold(input.lines(), |mut lines| async move {
        Ok::<_, std::io::Error>(lines.next_line().await?.map(|line| (line, lines)))
    });
    lines
        .try_for_each_concurrent(concurrency.max(1), |line| {
            let handled = &handled;
            async move {
                if !line.trim().is_empty() {
                    dispatcher.handle(line.as_bytes()).await;
                    handled.fetch_add(1, Ordering::Relaxed);
                }
                Ok(())
            }
        })
        .await
        .or_raise(|| ErrorKind::Input)?;
    Ok(handled.into_inner())
}

#[derive(Serialize)]
struct Envelope<'a> {
    routing_key: &'a str,
    message: &'a Outbound,
}

/// Writes each published message as one JSON line.
pub struct LinePublisher<W> {
    out: Mutex<W>,
}
impl<W> LinePublisher<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    #[cfg(test)]
    pub async fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W> Publisher for LinePublisher<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn publish(&self, routing_key: &str, message: &Outbound) -> PipelineResult<()> {
        let failed = || PipelineErrorKind::Publish(routing_key.to_string());
        let mut line = serde_json::to_vec(&Envelope { routing_key, message }).or_raise(failed)?;
        line.push(b'\n');
        // One writer at a time, or concurrent lines interleave.
        let mut out = self.out.lock().await;
        out.write_all(&line).await.or_raise(failed)?;
        out.flush().await.or_raise(failed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maw_graph::{Database, Repository};
    use maw_inspect::{ExitPolicy, FileSniffer, Fingerprinter, Tool, ToolChecker, ToolRepairer};
    use maw_pipeline::{Context, DeletedMessage, MessageRules, ProcessedMessage, Routes};
    use maw_storage::Librarian;
    use maw_storage::backend::LocalBackend;
    use std::sync::Arc;
    use std::time::Duration;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn processed() -> Outbound {
        Outbound::Processed(ProcessedMessage {
            library: "docs".to_string(),
            path: "a.txt".to_string(),
            timestamp: OffsetDateTime::UNIX_EPOCH,
            uuid: Uuid::nil(),
            mime: "text/plain".to_string(),
        })
    }

    #[tokio::test]
    async fn test_publisher_writes_one_line_per_message() {
        let publisher = LinePublisher::new(Vec::new());
        publisher.publish("text.index", &processed()).await.unwrap();
        publisher.publish("text.lang", &processed()).await.unwrap();
        let written = String::from_utf8(publisher.into_inner().await).unwrap();
        let lines: Vec<serde_json::Value> = written.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["routing_key"], "text.index");
        assert_eq!(lines[1]["routing_key"], "text.lang");
        assert_eq!(lines[0]["message"]["Mime"], "text/plain");
        assert_eq!(lines[0]["message"]["Timestamp"], "1970-01-01T00:00:00Z");
    }

    /// A dispatcher whose tools are never expected to run.
    async fn dispatcher(root: &std::path::Path, publisher: Arc<dyn Publisher>) -> Dispatcher {
        let inert = || Tool::new("/nonexistent/tool", Vec::<String>::new(), Duration::from_secs(1));
        let db = Database::connect_in_memory().await.unwrap();
        Dispatcher::new(Context {
            librarian: Librarian::new().with_library("docs", Arc::new(LocalBackend::new("docs", root).unwrap())),
            repository: Repository::from(&db),
            sniffer: Arc::new(FileSniffer::new(inert())),
            checker: Arc::new(ToolChecker::new(inert(), ExitPolicy::default(), ["application/pdf"])),
            repairer: Arc::new(ToolRepairer::new(inert(), ExitPolicy::default())),
            publisher,
            fingerprinter: Fingerprinter::default(),
            routes: Routes::default(),
            rules: MessageRules::default(),
            deleted_routing_key: Some("file.deleted".to_string()),
            temp_dir: None,
        })
    }

    #[tokio::test]
    async fn test_consume_skips_blank_lines_and_survives_bad_ones() {
        let root = tempfile::tempdir().unwrap();
        let publisher = Arc::new(LinePublisher::new(Vec::new()));
        let dispatcher = dispatcher(root.path(), publisher.clone()).await;
        let input = concat!(
            "not json\n",
            "\n",
            r#"{"Library":"docs","Path":"gone.txt","EventType":"DELETE","Timestamp":"2024-01-02T03:04:05Z"}"#,
            "\n",
            r#"{"hello":"world"}"#,
            "\n",
        );
        let handled = consume(&dispatcher, input.as_bytes(), 4).await.unwrap();
        assert_eq!(handled, 3);

        drop(dispatcher);
        let publisher = Arc::into_inner(publisher).unwrap();
        let written = String::from_utf8(publisher.into_inner().await).unwrap();
        let line: serde_json::Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(line["routing_key"], "file.deleted");
        let expected = Outbound::Deleted(DeletedMessage {
            library: "docs".to_string(),
            path: "gone.txt".to_string(),
            timestamp: time::macros::datetime!(2024-01-02 03:04:05 UTC),
            uuid: None,
            event_type: "DELETE",
        });
        assert_eq!(line["message"], serde_json::to_value(&expected).unwrap());
    }

    #[tokio::test]
    async fn test_consume_ingests_from_local_library() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("notes.txt"), b"hello").unwrap();
        let publisher = Arc::new(LinePublisher::new(Vec::new()));
        let dispatcher = dispatcher(root.path(), publisher).await;
        let input = r#"{"Library":"docs","Path":"notes.txt","EventType":"CREATE"}"#;
        assert_eq!(consume(&dispatcher, input.as_bytes(), 1).await.unwrap(), 1);
        let record = dispatcher
            .context()
            .repository
            .get(&maw_graph::Identity::new("docs", "notes.txt"))
            .await
            .unwrap()
            .unwrap();
        // The sniffer can't run here, so the name decides.
        assert_eq!(record.mime_type.as_deref(), Some("text/plain"));
        assert_eq!(record.size, Some(5));
    }
}
