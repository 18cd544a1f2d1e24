//! Graph persistence for ingested file records.
//!
//! The graph is kept in an embedded SQLite database. It holds two node types
//! and one relationship:
//! - **Files**: one node per identity key `(library, path)`. A node carries a
//!   uuid that is assigned once and then never changes, the descriptive
//!   properties of the last successful ingestion, and two flags:
//!   `pending_upload` and the monotonic `attempted_fix` repair guard.
//! - **Attachments**: dependent assets (thumbnails, page renders) that live
//!   elsewhere in storage and are referenced by `(library, path)`.
//! - **HAS_ATTACHMENT**: attachment → file, stored as a foreign key that
//!   cascades when the file is detached.
//!
//! [`Repository`] is the only writer.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{AttachmentKind, AttachmentRef, FileProperties, FileRecord, Identity, RecordState, Upserted};
pub use crate::repo::{Removed, Repository};
