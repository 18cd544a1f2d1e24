//! Event Dispatcher: one raw message in, one logged outcome out.

use crate::error::{ErrorKind, Result};
use crate::event::{Action, IngestionEvent};
use crate::integrity::{self, Gate};
use crate::message::{Inbound, MessageRules};
use crate::publish::{DeletedMessage, Outbound, ProcessedMessage, Publisher};
use crate::routing::Routes;
use crate::scratch::Scratch;
use exn::ResultExt;
use futures::future::join_all;
use maw_graph::{FileProperties, Repository};
use maw_inspect::{Classification, Fingerprinter, IntegrityChecker, MimeSniffer, Repairer};
use maw_storage::Librarian;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::Instrument;
use uuid::Uuid;

/// Everything event handling needs, passed in explicitly.
pub struct Context {
    pub librarian: Librarian,
    pub repository: Repository,
    pub sniffer: Arc<dyn MimeSniffer>,
    pub checker: Arc<dyn IntegrityChecker>,
    pub repairer: Arc<dyn Repairer>,
    pub publisher: Arc<dyn Publisher>,
    pub fingerprinter: Fingerprinter,
    pub routes: Routes,
    pub rules: MessageRules,
    /// Routing key for deletion notices; none are published without one.
    pub deleted_routing_key: Option<String>,
    /// Parent of per-event scratch directories (system temp if `None`).
    pub temp_dir: Option<PathBuf>,
}

/// How a message was dealt with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The file was ingested; `published` counts successful deliveries.
    Processed { uuid: Uuid, mime: String, published: usize },
    /// A repaired replacement was uploaded; its own event will be processed.
    Repaired,
    /// The record (if any) and its attachments were removed.
    Deleted { uuid: Option<Uuid>, attachments_removed: usize },
    /// Nothing to do (folder placeholders, hidden and temporary files).
    Ignored,
}

#[derive(Clone)]
pub struct Dispatcher {
    ctx: Arc<Context>,
}

impl Dispatcher {
    pub fn new(ctx: Context) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Handle one raw message. Never fails: every error is logged and the
    /// message dropped, so one bad message can't stall the consumer.
    pub async fn handle(&self, raw: &[u8]) {
        let event = match self.event_of(raw) {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::debug!("Ignored message");
                return;
            }
            Err(e) => {
                tracing::error!(stage = e.stage(), error = ?e, "Dropped message");
                return;
            }
        };
        let (library, path) = (&event.library, &event.path);
        match self.ingest(&event).await {
            Ok(Outcome::Processed { uuid, mime, published }) => {
                tracing::info!(%library, %path, %uuid, %mime, published, "Processed file");
            }
            Ok(Outcome::Repaired) => {
                tracing::info!(%library, %path, "Repaired file; awaiting its re-upload event");
            }
            Ok(Outcome::Deleted { uuid, attachments_removed }) => {
                tracing::info!(%library, %path, uuid = ?uuid, attachments_removed, "Deleted file");
            }
            Ok(Outcome::Ignored) => tracing::debug!(%library, %path, "Ignored message"),
            Err(e) => tracing::error!(%library, %path, stage = e.stage(), error = ?e, "Dropped message"),
        }
    }

    /// Classify and handle one raw message, returning what happened.
    pub async fn process(&self, raw: &[u8]) -> Result<Outcome> {
        match self.event_of(raw)? {
            Some(event) => self.ingest(&event).await,
            None => Ok(Outcome::Ignored),
        }
    }

    /// The event a raw message describes; `None` for folder notifications.
    fn event_of(&self, raw: &[u8]) -> Result<Option<IngestionEvent>> {
        match Inbound::classify(raw, &self.ctx.rules, OffsetDateTime::now_utc()) {
            Inbound::Generic(event) | Inbound::Provider { event, directory: false } => Ok(Some(event)),
            Inbound::Provider { event, directory: true } => {
                tracing::debug!(library = %event.library, path = %event.path, "Skipping folder");
                Ok(None)
            }
            Inbound::Unrecognized(reason) => exn::bail!(ErrorKind::UnrecognizedMessage(reason)),
        }
    }

    /// Handle an already normalized event.
    pub async fn ingest(&self, event: &IngestionEvent) -> Result<Outcome> {
        let span = tracing::info_span!("event", library = %event.library, path = %event.path, action = %event.action);
        async {
            if event.is_folder() {
                return Ok(Outcome::Ignored);
            }
            if event.is_hidden(&self.ctx.rules.ignored_prefixes) {
                tracing::debug!("Skipping hidden or temporary file");
                return Ok(Outcome::Ignored);
            }
            match event.action {
                Action::Create => self.create(event).await,
                Action::Delete => self.delete(event).await,
            }
        }
        .instrument(span)
        .await
    }

    async fn create(&self, event: &IngestionEvent) -> Result<Outcome> {
        let scratch = Scratch::new(self.ctx.temp_dir.as_deref()).or_raise(|| ErrorKind::Scratch)?;
        let outcome = self.create_in(event, &scratch).await;
        scratch.close();
        outcome
    }

    /// acquire → classify → check/repair → fingerprint → persist → route
    async fn create_in(&self, event: &IngestionEvent, scratch: &Scratch) -> Result<Outcome> {
        let ctx = &self.ctx;
        let source = scratch.source();
        ctx.librarian
            .download(&event.library, Path::new(&event.path), &source)
            .await
            .or_raise(|| ErrorKind::Acquisition)?;

        let classification = Classification::of(&*ctx.sniffer, event.name(), &source).await;
        let attempted_fix = match integrity::inspect(ctx, event, scratch, &classification.mime).await? {
            Gate::Accepted { attempted_fix } => attempted_fix,
            Gate::Repaired => return Ok(Outcome::Repaired),
        };

        let fingerprint = ctx.fingerprinter.digest_file(&source).await.or_raise(|| ErrorKind::Fingerprint)?;
        let properties = FileProperties {
            name: event.name().to_string(),
            mime_type: classification.mime,
            size: fingerprint.size,
            sha256: fingerprint.sha256,
            crawled_at: event.timestamp,
            attempted_fix,
        };
        let upserted =
            ctx.repository.upsert(&event.identity(), &properties).await.or_raise(|| ErrorKind::Persistence)?;

        let destinations = ctx.routes.resolve(&upserted.mime_type);
        let message = Outbound::Processed(ProcessedMessage {
            library: event.library.clone(),
            path: event.path.clone(),
            timestamp: event.timestamp,
            uuid: upserted.uuid,
            mime: upserted.mime_type.clone(),
        });
        let published = self.publish_all(destinations, &message).await;
        if destinations.is_empty() {
            tracing::debug!(mime = %upserted.mime_type, "No routing configured for type");
        }
        Ok(Outcome::Processed { uuid: upserted.uuid, mime: upserted.mime_type, published })
    }

    async fn delete(&self, event: &IngestionEvent) -> Result<Outcome> {
        let ctx = &self.ctx;
        let removed = ctx.repository.delete_cascading(&event.identity()).await.or_raise(|| ErrorKind::Persistence)?;
        let deletions = removed.attachments.iter().map(|attachment| async move {
            match ctx.librarian.delete(&attachment.library, Path::new(&attachment.path)).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(
                        attachment.library = %attachment.library,
                        attachment.path = %attachment.path,
                        error = ?e,
                        "Could not delete attachment from storage"
                    );
                    false
                }
            }
        });
        let attachments_removed = join_all(deletions).await.into_iter().filter(|deleted| *deleted).count();

        if let Some(routing_key) = &ctx.deleted_routing_key {
            let message = Outbound::Deleted(DeletedMessage {
                library: event.library.clone(),
                path: event.path.clone(),
                timestamp: event.timestamp,
                uuid: removed.uuid,
                event_type: "DELETE",
            });
            self.publish_all(std::slice::from_ref(routing_key), &message).await;
        }
        Ok(Outcome::Deleted { uuid: removed.uuid, attachments_removed })
    }

    /// Publish to every destination independently; returns how many
    /// succeeded. Failures are logged per destination.
    async fn publish_all(&self, destinations: &[String], message: &Outbound) -> usize {
        let attempts = destinations.iter().map(|routing_key| async move {
            match self.ctx.publisher.publish(routing_key, message).await {
                Ok(()) => {
                    tracing::debug!(%routing_key, "Published");
                    true
                }
                Err(e) => {
                    tracing::warn!(%routing_key, error = ?e, "Publish failed");
                    false
                }
            }
        });
        join_all(attempts).await.into_iter().filter(|published| *published).count()
    }
}
