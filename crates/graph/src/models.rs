use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// The `(library, path)` pair that names a logical file across repeated
/// events. Never the checksum, never a generated identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub library: String,
    pub path: String,
}
impl Identity {
    pub fn new(library: impl Into<String>, path: impl Into<String>) -> Self {
        Self { library: library.into(), path: path.into() }
    }
}
impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.library, self.path)
    }
}

/// Descriptive properties written by a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileProperties {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    /// Base64 SHA-256 of the content.
    pub sha256: String,
    pub crawled_at: OffsetDateTime,
    /// OR-ed into the stored flag; `false` never clears it.
    pub attempted_fix: bool,
}

/// What an upsert hands back: the (possibly pre-existing) uuid, and the
/// mime type now stored on the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    pub uuid: Uuid,
    pub mime_type: String,
}

/// Just enough of a record to gate repair attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordState {
    pub uuid: Uuid,
    pub attempted_fix: bool,
    pub pending_upload: bool,
}

/// Full file node as stored.
///
/// Descriptive properties are optional: a node created by the repair guard
/// has none until the repaired file's own CREATE event lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub identity: Identity,
    pub uuid: Uuid,
    pub name: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    pub sha256: Option<String>,
    pub crawled_at: Option<OffsetDateTime>,
    pub pending_upload: bool,
    pub attempted_fix: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Thumbnail,
    Page,
}
impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thumbnail => "thumbnail",
            Self::Page => "page",
        }
    }
}
impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for AttachmentKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thumbnail" => Ok(Self::Thumbnail),
            "page" => Ok(Self::Page),
            _ => exn::bail!(ErrorKind::InvalidData("attachment kind")),
        }
    }
}

/// A dependent asset, addressed in storage by `(library, path)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttachmentRef {
    pub kind: AttachmentKind,
    pub library: String,
    pub path: String,
}
impl AttachmentRef {
    pub fn new(kind: AttachmentKind, library: impl Into<String>, path: impl Into<String>) -> Self {
        Self { kind, library: library.into(), path: path.into() }
    }

    /// Conventional location of a file's thumbnail.
    pub fn thumbnail(library: impl Into<String>, uuid: Uuid) -> Self {
        Self::new(AttachmentKind::Thumbnail, library, format!("card-thumbs/File/{uuid}.jpg"))
    }
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(value).or_raise(|| ErrorKind::InvalidData("uuid"))
}

#[derive(sqlx::FromRow)]
pub(crate) struct FileRow {
    library: String,
    path: String,
    uuid: String,
    name: Option<String>,
    mime_type: Option<String>,
    size: Option<i64>,
    sha256: Option<String>,
    crawled_at: Option<i64>,
    pending_upload: bool,
    attempted_fix: bool,
}
impl TryFrom<FileRow> for FileRecord {
    type Error = Error;
    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        Ok(Self {
            uuid: parse_uuid(&row.uuid)?,
            identity: Identity::new(row.library, row.path),
            name: row.name,
            mime_type: row.mime_type,
            size: row.size.map(u64::try_from).transpose().or_raise(|| ErrorKind::InvalidData("size"))?,
            sha256: row.sha256,
            crawled_at: row
                .crawled_at
                .map(OffsetDateTime::from_unix_timestamp)
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("crawl date"))?,
            pending_upload: row.pending_upload,
            attempted_fix: row.attempted_fix,
        })
    }
}
impl From<&FileRecord> for RecordState {
    fn from(record: &FileRecord) -> Self {
        Self {
            uuid: record.uuid,
            attempted_fix: record.attempted_fix,
            pending_upload: record.pending_upload,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AttachmentRow {
    kind: String,
    library: String,
    path: String,
}
impl TryFrom<AttachmentRow> for AttachmentRef {
    type Error = Error;
    fn try_from(row: AttachmentRow) -> Result<Self, Self::Error> {
        Ok(Self { kind: row.kind.parse()?, library: row.library, path: row.path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> FileRow {
        FileRow {
            library: "docs".to_string(),
            path: "reports/q1.pdf".to_string(),
            uuid: "6a1f4b52-8d0c-4f5e-9b7a-2c3d4e5f6a7b".to_string(),
            name: Some("q1.pdf".to_string()),
            mime_type: Some("application/pdf".to_string()),
            size: Some(1024),
            sha256: Some("47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=".to_string()),
            crawled_at: Some(1_700_000_000),
            pending_upload: false,
            attempted_fix: true,
        }
    }

    #[test]
    fn test_row_to_model() {
        let record = FileRecord::try_from(row()).unwrap();
        assert_eq!(record.identity, Identity::new("docs", "reports/q1.pdf"));
        assert_eq!(record.size, Some(1024));
        assert_eq!(record.crawled_at.unwrap().unix_timestamp(), 1_700_000_000);
        assert!(RecordState::from(&record).attempted_fix);
    }

    #[test]
    fn test_row_with_bad_uuid() {
        let mut bad = row();
        bad.uuid = "not-a-uuid".to_string();
        let err = FileRecord::try_from(bad).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("uuid")));
    }

    #[test]
    fn test_attachment_kind_round_trip() {
        for kind in [AttachmentKind::Thumbnail, AttachmentKind::Page] {
            assert_eq!(kind.as_str().parse::<AttachmentKind>().unwrap(), kind);
        }
        assert!("poster".parse::<AttachmentKind>().is_err());
    }

    #[test]
    fn test_thumbnail_location() {
        let uuid = Uuid::nil();
        let thumb = AttachmentRef::thumbnail("miniofiles", uuid);
        assert_eq!(thumb.path, "card-thumbs/File/00000000-0000-0000-0000-000000000000.jpg");
        assert_eq!(thumb.kind, AttachmentKind::Thumbnail);
    }
}
