//! Outbound messages and the broker seam.

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Published to every routing key resolved for a file's MIME type once it
/// has been ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessedMessage {
    pub library: String,
    pub path: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub uuid: Uuid,
    pub mime: String,
}

/// Published once a deletion has been fully processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeletedMessage {
    pub library: String,
    pub path: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Uuid of the removed node, if there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    pub event_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    Processed(ProcessedMessage),
    Deleted(DeletedMessage),
}

/// Downstream message broker.
///
/// Implementations handle their own connection management and concurrency;
/// every call is independent.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, routing_key: &str, message: &Outbound) -> Result<()>;
}
