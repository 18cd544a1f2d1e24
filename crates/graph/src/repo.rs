//! Repository for file nodes and their attachments.
//!
//! Every write is a single statement (or a single transaction), so
//! concurrent events for the same identity key can interleave freely without
//! ever producing a second node.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{
    AttachmentRef, AttachmentRow, FileProperties, FileRecord, FileRow, Identity, RecordState, Upserted, parse_uuid,
};
use exn::ResultExt;
use sqlx::SqlitePool;
use tracing::instrument;
use uuid::Uuid;

/// What a cascading delete removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removed {
    /// Uuid of the deleted file node, `None` if there was nothing to delete.
    pub uuid: Option<Uuid>,
    /// Attachments that hung off the node. Their storage objects are now
    /// orphaned and up to the caller to clean up.
    pub attachments: Vec<AttachmentRef>,
}

/// Repository over the file graph.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn size_column(size: u64) -> Result<i64> {
        i64::try_from(size).or_raise(|| ErrorKind::InvalidData("size"))
    }

    // =========================================================================
    // Write
    // =========================================================================

    /// Match-or-create the node for `identity` and overwrite its descriptive
    /// properties.
    ///
    /// A new uuid is only assigned if the node didn't exist yet; the stored
    /// one is returned otherwise. `pending_upload` is cleared and
    /// `attempted_fix` can only go from false to true. One statement, so two
    /// concurrent upserts of the same key end with exactly one node.
    #[instrument(skip(self, properties), fields(mime = %properties.mime_type, size = properties.size))]
    pub async fn upsert(&self, identity: &Identity, properties: &FileProperties) -> Result<Upserted> {
        let (uuid, mime_type): (String, Option<String>) = sqlx::query_as(include_str!("../queries/upsert_file.sql"))
            .bind(&identity.library)
            .bind(&identity.path)
            .bind(Uuid::new_v4().to_string())
            .bind(&properties.name)
            .bind(&properties.mime_type)
            .bind(Self::size_column(properties.size)?)
            .bind(&properties.sha256)
            .bind(properties.crawled_at.unix_timestamp())
            .bind(properties.attempted_fix)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(Upserted {
            uuid: parse_uuid(&uuid)?,
            mime_type: mime_type.unwrap_or_else(|| properties.mime_type.clone()),
        })
    }

    /// Durably record that a repair has been attempted for `identity`.
    ///
    /// Creates a placeholder node (pending upload, no descriptive properties)
    /// if none exists yet, so the CREATE event caused by re-uploading the
    /// repaired file finds the guard already set.
    #[instrument(skip(self))]
    pub async fn mark_repair_attempted(&self, identity: &Identity) -> Result<Uuid> {
        let (uuid,): (String,) = sqlx::query_as(include_str!("../queries/mark_repair_attempted.sql"))
            .bind(&identity.library)
            .bind(&identity.path)
            .bind(Uuid::new_v4().to_string())
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        parse_uuid(&uuid)
    }

    /// Record a dependent attachment of an existing file node. Attaching the
    /// same `(library, path)` twice only updates its kind.
    ///
    /// Returns [`ErrorKind::FileNotFound`] if there is no node for `identity`.
    #[instrument(skip(self), fields(attachment = %attachment.path))]
    pub async fn attach(&self, identity: &Identity, attachment: &AttachmentRef) -> Result<()> {
        let result = sqlx::query(include_str!("../queries/attach.sql"))
            .bind(attachment.kind.as_str())
            .bind(&attachment.library)
            .bind(&attachment.path)
            .bind(&identity.library)
            .bind(&identity.path)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::FileNotFound(identity.library.clone(), identity.path.clone()));
        }
        Ok(())
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Detach and delete the node for `identity` together with every
    /// attachment node hanging off it, returning the attachments that
    /// existed.
    ///
    /// Deleting a node that doesn't exist is a no-op and returns an empty
    /// [`Removed`].
    #[instrument(skip(self))]
    pub async fn delete_cascading(&self, identity: &Identity) -> Result<Removed> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        // Collect attachments explicitly: the foreign key cascade would
        // remove them too, but without telling us what they were.
        let rows: Vec<AttachmentRow> = sqlx::query_as(include_str!("../queries/detach_attachments.sql"))
            .bind(&identity.library)
            .bind(&identity.path)
            .fetch_all(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let uuid: Option<(String,)> = sqlx::query_as(include_str!("../queries/delete_file.sql"))
            .bind(&identity.library)
            .bind(&identity.path)
            .fetch_optional(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        let attachments = rows.into_iter().map(AttachmentRef::try_from).collect::<Result<Vec<_>>>()?;
        let uuid = uuid.map(|(uuid,)| parse_uuid(&uuid)).transpose()?;
        tracing::debug!(found = uuid.is_some(), attachments = attachments.len(), "Deleted file node");
        Ok(Removed { uuid, attachments })
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Get the full node for `identity`.
    pub async fn get(&self, identity: &Identity) -> Result<Option<FileRecord>> {
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_by_identity.sql"))
            .bind(&identity.library)
            .bind(&identity.path)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileRecord::try_from).transpose()
    }

    /// Whether a node exists for `identity`, and the state of its guards.
    pub async fn lookup(&self, identity: &Identity) -> Result<Option<RecordState>> {
        Ok(self.get(identity).await?.as_ref().map(RecordState::from))
    }

    /// Attachments of the node for `identity`, ordered by location.
    pub async fn attachments(&self, identity: &Identity) -> Result<Vec<AttachmentRef>> {
        let rows: Vec<AttachmentRow> = sqlx::query_as(include_str!("../queries/list_attachments.sql"))
            .bind(&identity.library)
            .bind(&identity.path)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(AttachmentRef::try_from).collect()
    }
}
